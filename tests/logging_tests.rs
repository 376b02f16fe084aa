use stromspot::config::LoggingConfig;
use stromspot::logging::{LogContext, get_logger, get_logger_with_context, init_logging};
use uuid::Uuid;

#[test]
fn logging_init_and_cycle_loggers() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "DEBUG".to_string(),
        console_output: true,
        file: dir.path().join("stromspot.log").to_string_lossy().to_string(),
        ..Default::default()
    };
    assert!(init_logging(&config).is_ok());
    // second call is a no-op
    assert!(init_logging(&config).is_ok());

    let cycle = Uuid::new_v4();
    let logger = get_logger("prices").for_cycle(cycle).with_field("day", "today");
    assert_eq!(logger.component(), "prices");
    logger.info("cycle started");
    logger.debug("cycle detail");

    let ctx = LogContext::new("consumption")
        .with_cycle_id(cycle)
        .with_field("contract", "c-1");
    let logger = get_logger_with_context(ctx);
    logger.warn("no readings");
}
