//! Application services: the public site pipeline and the authoring flows.

pub mod authoring;
pub mod composer;
pub mod error;
pub mod markdown;
pub mod navigator;
pub mod pagination;
pub mod repos;
pub mod resolver;
pub mod site;
pub mod syndication;
pub mod tags;
pub mod transfer;
