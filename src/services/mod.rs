pub mod ai_service;
pub mod bank_service;
pub mod composer;
pub mod curriculum_service;
pub mod draft_parser;
pub mod export_service;
pub mod paper_service;
pub mod paper_store;
pub mod reconcile_service;
