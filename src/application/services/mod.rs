pub mod local_edit;
pub mod seed_service;
pub mod upload_service;
