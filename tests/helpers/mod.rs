pub mod recording_notifier;
pub mod test_utils;
