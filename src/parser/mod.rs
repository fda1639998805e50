pub mod device;
mod entrypoint;
pub mod fields;
pub mod iperf;
pub mod ping;
pub mod segment;
pub mod tcp;
pub mod traceroute;
pub mod udp;

pub use entrypoint::{
    detect_file_kind, parse_log_file, FileParser, FIELD_TEST_SIGNATURE, TRACEROUTE_SIGNATURE,
};
pub use segment::{split_into_test_chunks, LogText, Segmentation};
