//! Lookups over the tests of a parsed file.

mod filter;

pub use filter::TestFilters;

use crate::types::{
    Endpoint, FileRecord, PingTest, TcpTest, TestKey, TestKind, TestResult, UdpTest,
};
use std::collections::BTreeMap;

impl FileRecord {
    /// Every test of one kind, in file order.
    pub fn tests(&self, kind: TestKind) -> Vec<&TestResult> {
        self.tests.iter().filter(|t| t.kind() == kind).collect()
    }

    /// Tests of one kind matching all set filters.
    pub fn find_tests(&self, kind: TestKind, filters: &TestFilters) -> Vec<&TestResult> {
        self.tests
            .iter()
            .filter(|t| t.kind() == kind && filters.matches(t))
            .collect()
    }

    /// The test stored under `key`; for repeated keys the last one parsed.
    pub fn test_by_key(&self, key: TestKey) -> Option<&TestResult> {
        self.by_number.get(&key).and_then(|&i| self.tests.get(i))
    }

    /// Tests indexed by their composite number, ascending.
    pub fn tests_by_number(&self) -> BTreeMap<TestKey, &TestResult> {
        self.by_number
            .iter()
            .filter_map(|(key, &i)| self.tests.get(i).map(|t| (*key, t)))
            .collect()
    }

    /// Number of distinct test keys in the file.
    pub fn test_count(&self) -> usize {
        self.by_number.len()
    }

    pub fn ping_test_for(&self, endpoint: Endpoint) -> Option<&PingTest> {
        self.find_tests(TestKind::Ping, &TestFilters::endpoint(endpoint))
            .into_iter()
            .find_map(TestResult::as_ping)
    }

    pub fn udp_tests_for(&self, endpoint: Endpoint) -> Vec<&UdpTest> {
        self.find_tests(TestKind::Udp, &TestFilters::endpoint(endpoint))
            .into_iter()
            .filter_map(TestResult::as_udp)
            .collect()
    }

    /// TCP tests toward `endpoint`, ascending by test number. A pair
    /// recorded out of order is swapped.
    pub fn tcp_tests_for(&self, endpoint: Endpoint) -> Vec<&TcpTest> {
        let mut tests: Vec<&TcpTest> = self
            .find_tests(TestKind::Tcp, &TestFilters::endpoint(endpoint))
            .into_iter()
            .filter_map(TestResult::as_tcp)
            .collect();
        if tests.len() == 2 && tests[0].header.test_number > tests[1].header.test_number {
            tests.swap(0, 1);
        }
        tests
    }
}
