// src/application/ports/navigation.rs
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Profile,
    Receipts,
    ReceiptDetail(String),
    ReceiptReview(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_owned(),
            Self::Dashboard => "/dashboard".to_owned(),
            Self::Profile => "/profile".to_owned(),
            Self::Receipts => "/receipts".to_owned(),
            Self::ReceiptDetail(id) => format!("/receipts/{id}"),
            Self::ReceiptReview(id) => format!("/receipts/{id}/review"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}
