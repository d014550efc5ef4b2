// Interface adapters: HTTP surface and the document store client.

pub mod clients;
pub mod handlers;
pub mod protocol;
pub mod routes;
pub mod state;
