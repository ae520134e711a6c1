pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod friendship;
    pub mod graph;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod friendship;
    pub mod memory;
    pub mod session;
    pub mod subscription;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod graph;
    pub mod relationships;
    pub mod users;
}

pub mod handlers {
    pub mod auth;
    pub mod communities;
    pub mod friends;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod auth;
}
