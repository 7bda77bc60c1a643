pub mod bootstrap_models_use_case;
pub mod domain;
pub mod infrastructure;
