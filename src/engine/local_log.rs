//! Bounded ring of recent engine decisions, included in dumps.

use log::info;
use std::collections::VecDeque;

pub const LOCAL_LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct LocalLog {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LocalLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest once full. Also goes to `info!`.
    pub fn log(&mut self, now_ms: u64, message: String) {
        info!("{}", message);
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(format!("{}ms: {}", now_ms, message));
    }

    /// Oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut log = LocalLog::new(2);
        log.log(1, "a".to_string());
        log.log(2, "b".to_string());
        log.log(3, "c".to_string());
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, vec!["2ms: b", "3ms: c"]);
    }
}
