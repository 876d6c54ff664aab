mod pending_connection_repo;

pub use pending_connection_repo::PendingConnectionRepo;
