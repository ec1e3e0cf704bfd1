//! YAML configuration driving a whole analysis

mod common;

use common::*;
use scope_dependency::{AnalysisConfig, ConfigError, ProcessorAnalyzer};
use std::sync::Arc;

/// `output.b = Lib.Id(input.a)`
fn processor_with_callee() -> ProcessorBuilder {
    let id = static_string_method("Lib", "Id");
    ProcessorBuilder::new(INPUT_SCHEMA, OUTPUT_SCHEMA)
        .with_method(identity_body(id.clone()))
        .with_move_next(|m| {
            let row = m.read_input_row();
            let value = m.read_string(&row, "a");
            let copied = m.call(id, &[&value]);
            let out = m.output_row();
            m.write(&out, "b", &copied);
            m.yield_row(&out);
            m.ret();
        })
}

#[test]
fn test_config_file_disables_interprocedural_analysis() {
    let file = yaml_file(INTRAPROCEDURAL_CONFIG);
    let config = AnalysisConfig::from_yaml(file.path()).unwrap();
    assert!(!config.interprocedural);

    let (info, program) = processor_with_callee().build();
    let mut analyzer = ProcessorAnalyzer::new(Arc::new(program), config);
    let report = analyzer.analyze(&info).unwrap();

    assert_top(&report);
    assert_diagnostic(&report, "Demo.Lib.Id");
    assert_eq!(analyzer.diagnostics().counters.analyzed_callees, 0);
}

#[test]
fn test_config_file_with_defaults_keeps_precision() {
    let file = yaml_file(&config_yaml(50, 3));
    let config = AnalysisConfig::from_yaml(file.path()).unwrap();
    assert_eq!(config.max_stack_depth, 50);
    assert_eq!(config.max_block_retries, 3);

    let (info, program) = processor_with_callee().build();
    let report = ProcessorAnalyzer::new(Arc::new(program), config)
        .analyze(&info)
        .unwrap();

    assert_not_top(&report);
    assert_data_dependencies(&report, "b", &["a"]);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let file = yaml_file(&config_yaml(0, 3));
    let err = AnalysisConfig::from_yaml(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Range { ref field, .. } if field == "max_stack_depth"));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::from_yaml(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_written_config_reloads() {
    let config = AnalysisConfig::new().max_stack_depth(7).pure_type("Demo.Math");
    let file = yaml_file(&config.to_yaml().unwrap());
    assert_eq!(AnalysisConfig::from_yaml(file.path()).unwrap(), config);
}
