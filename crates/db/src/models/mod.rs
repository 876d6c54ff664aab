pub mod pending_connection;
