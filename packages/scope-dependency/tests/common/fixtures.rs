//! Test fixtures
//!
//! Schemas and configuration documents shared by the integration tests.

use std::io::Write;
use tempfile::NamedTempFile;

pub const INPUT_SCHEMA: &str = "a:string,b:string,c:bool";
pub const OUTPUT_SCHEMA: &str = "b:string,d:string";

/// Same columns on both sides, for row copies
pub const COPY_SCHEMA: &str = "a:string,b:string";

pub const INTRAPROCEDURAL_CONFIG: &str = "version: 1\ninterprocedural: false\n";

pub fn config_yaml(max_stack_depth: usize, max_block_retries: usize) -> String {
    format!(
        "version: 1\ninterprocedural: true\nmax_stack_depth: {max_stack_depth}\nmax_block_retries: {max_block_retries}\n"
    )
}

/// Write `content` to a temporary YAML file kept alive by the handle
pub fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}
