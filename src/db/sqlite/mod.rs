mod records;

pub use records::SqliteRecordStore;
