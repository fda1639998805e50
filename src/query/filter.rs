use crate::types::{Endpoint, TestResult};
use serde::{Deserialize, Serialize};

/// Attribute filters for selecting tests. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFilters {
    pub endpoint: Option<Endpoint>,
    pub test_number: Option<u32>,
    pub sub_test_number: Option<u32>,
    /// iperf run length in seconds; never matches ping or traceroute.
    pub interval_secs: Option<u32>,
    pub has_error: Option<bool>,
}

impl TestFilters {
    pub fn endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, secs: u32) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    pub fn with_error(mut self, has_error: bool) -> Self {
        self.has_error = Some(has_error);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, test: &TestResult) -> bool {
        let header = test.header();

        if let Some(endpoint) = self.endpoint {
            if header.endpoint != endpoint {
                return false;
            }
        }
        if let Some(n) = self.test_number {
            if header.test_number != n {
                return false;
            }
        }
        if let Some(sub) = self.sub_test_number {
            if header.sub_test_number != sub {
                return false;
            }
        }
        if let Some(secs) = self.interval_secs {
            if test.duration_secs() != Some(secs) {
                return false;
            }
        }
        if let Some(has_error) = self.has_error {
            if header.has_error() != has_error {
                return false;
            }
        }

        true
    }
}
