pub mod executor; // Bounded blocking-work gate shared by all parse tasks
pub mod ingest; // Directory → module/partition/block/region graph
