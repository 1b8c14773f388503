pub mod app;
pub mod config;
pub mod coordinator;
pub mod k8s;
pub mod kube_client;
pub mod mailbox;
pub mod reset;
pub mod terminator;

#[cfg(test)]
mod mock;
