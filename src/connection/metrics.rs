use std::collections::VecDeque;

const HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionMetricsSnapshot {
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    pub tx_begin_count: u64,
    pub tx_commit_count: u64,
    pub tx_rollback_count: u64,
}

impl ConnectionMetricsSnapshot {
    pub fn statement_count(&self) -> u64 {
        self.select_count + self.insert_count + self.update_count + self.delete_count
    }
}

/// Statement and transaction counters for one connection plus a bounded history of
/// the most recent statements.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    counters: ConnectionMetricsSnapshot,
    history: VecDeque<String>,
}

impl ConnectionMetrics {
    pub fn snapshot(&self) -> ConnectionMetricsSnapshot {
        self.counters.clone()
    }

    pub fn reset(&mut self) {
        self.counters = ConnectionMetricsSnapshot::default();
        self.history.clear();
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn record_statement(&mut self, sql: &str) {
        if let Some(keyword) = leading_keyword(sql) {
            let counters = &mut self.counters;
            if keyword.eq_ignore_ascii_case("SELECT") {
                counters.select_count += 1;
            } else if keyword.eq_ignore_ascii_case("INSERT") {
                counters.insert_count += 1;
            } else if keyword.eq_ignore_ascii_case("UPDATE") {
                counters.update_count += 1;
            } else if keyword.eq_ignore_ascii_case("DELETE") {
                counters.delete_count += 1;
            } else if keyword.eq_ignore_ascii_case("BEGIN") {
                counters.tx_begin_count += 1;
            } else if keyword.eq_ignore_ascii_case("COMMIT") {
                counters.tx_commit_count += 1;
            } else if keyword.eq_ignore_ascii_case("ROLLBACK") {
                counters.tx_rollback_count += 1;
            }
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(sql.to_string());
    }

    pub fn record_begin(&mut self) {
        self.counters.tx_begin_count += 1;
    }

    pub fn record_commit(&mut self) {
        self.counters.tx_commit_count += 1;
    }

    pub fn record_rollback(&mut self) {
        self.counters.tx_rollback_count += 1;
    }
}

fn leading_keyword(sql: &str) -> Option<&str> {
    let trimmed = sql.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let end = trimmed
        .find(|c: char| c.is_ascii_whitespace() || c == ';')
        .unwrap_or(trimmed.len());
    Some(&trimmed[..end])
}
