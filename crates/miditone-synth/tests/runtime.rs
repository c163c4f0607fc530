//! Runtime lifecycle across teardown.
//!
//! Lives in its own test binary so no other test holds a runtime handle.

use miditone_synth::{Runtime, RuntimeError};

#[test]
fn teardown_allows_reinit_at_new_rate() {
    let first = Runtime::acquire(44100.0).unwrap();
    let shared = Runtime::acquire(44100.0).unwrap();
    assert!(matches!(
        Runtime::acquire(96000.0),
        Err(RuntimeError::SampleRateConflict { .. })
    ));

    drop(first);
    assert!(Runtime::is_active());
    drop(shared);
    assert!(!Runtime::is_active());

    let second = Runtime::acquire(96000.0).unwrap();
    assert_eq!(second.sample_rate(), 96000.0);
}
