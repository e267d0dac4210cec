pub mod policy_dir;

pub use policy_dir::{
    load_documents, load_policy_dir, policy_header, policy_name_from_file_name, title_case,
    PolicyLoadReport, SkippedFile,
};
