pub mod client;

pub use client::{FetchResponse, HttpClient, HttpError, Probe};
