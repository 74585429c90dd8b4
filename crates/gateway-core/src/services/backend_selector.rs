//! Round-robin backend selection.
//!
//! Only the round-robin strategy survives from the teacher's multi-strategy
//! load balancer (`LeastConnections`/`Random`/`Weighted`/`IpHash` have no
//! counterpart here). One selector guards one service's origin list and is
//! built once, at startup, from a non-empty list.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("service '{0}' has no configured origins")]
    NoOrigins(String),
}

/// Selects origins for one service in round-robin order.
///
/// The counter only ever grows; wrapping on overflow is fine since only
/// `counter % origins.len()` is observable.
#[derive(Debug)]
pub struct RoundRobinSelector {
    origins: Vec<String>,
    counter: AtomicU64,
}

impl RoundRobinSelector {
    pub fn new(service_name: &str, origins: Vec<String>) -> Result<Self, SelectorError> {
        if origins.is_empty() {
            return Err(SelectorError::NoOrigins(service_name.to_string()));
        }
        Ok(Self {
            origins,
            counter: AtomicU64::new(0),
        })
    }

    /// Returns the next origin in rotation. Never blocks, never fails once
    /// constructed — emptiness is rejected at construction time.
    pub fn next(&self) -> &str {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) as usize % self.origins.len();
        &self.origins[index]
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_origin_list() {
        let result = RoundRobinSelector::new("svc", vec![]);
        assert!(matches!(result, Err(SelectorError::NoOrigins(name)) if name == "svc"));
    }

    #[test]
    fn cycles_through_origins_in_order() {
        let selector = RoundRobinSelector::new(
            "svc",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .unwrap();

        assert_eq!(selector.next(), "a");
        assert_eq!(selector.next(), "b");
        assert_eq!(selector.next(), "c");
        assert_eq!(selector.next(), "a");
    }

    #[test]
    fn single_origin_always_selected() {
        let selector = RoundRobinSelector::new("svc", vec!["only".to_string()]).unwrap();
        for _ in 0..5 {
            assert_eq!(selector.next(), "only");
        }
    }

    #[test]
    fn concurrent_selection_visits_each_origin_equally() {
        use std::sync::Arc;
        use std::thread;

        let selector = Arc::new(
            RoundRobinSelector::new(
                "svc",
                vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
            )
            .unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let selector = selector.clone();
            handles.push(thread::spawn(move || {
                let mut picks = Vec::with_capacity(40);
                for _ in 0..40 {
                    picks.push(selector.next().to_string());
                }
                picks
            }));
        }

        let mut counts = std::collections::HashMap::new();
        for h in handles {
            for pick in h.join().unwrap() {
                *counts.entry(pick).or_insert(0) += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        for count in counts.values() {
            assert_eq!(*count, 80);
        }
    }
}
