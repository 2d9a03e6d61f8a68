pub mod snapshot_feed;
