pub mod password;
pub mod route_table;
pub mod token;
pub mod upstream_actor;
