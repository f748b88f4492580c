pub mod link;
pub mod scan;
