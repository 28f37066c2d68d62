/// On-chain identifiers (token ids, session ids, sequence numbers) fit in u64
/// for every contract this server talks to.
pub type ChainId = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
