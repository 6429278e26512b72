//! 可观测性模块集成测试
//!
//! 验证推送指标的记录与 Prometheus 渲染。

use push_shared::observability::metrics::{
    get_handle, install_recorder, record_push_dispatch, record_push_result,
};

#[test]
fn test_push_metrics_rendered() {
    let handle = install_recorder().expect("安装 recorder 失败");
    assert!(get_handle().is_some());

    record_push_result("NOTIFICATION_TYPE_COMPOSED", 998, 2);
    record_push_dispatch("partial", 0.35);
    record_push_dispatch("ok", 0.01);

    let rendered = handle.render();
    assert!(rendered.contains("push_recipients_total"));
    assert!(rendered.contains("result=\"success\""));
    assert!(rendered.contains("result=\"failure\""));
    assert!(rendered.contains("push_dispatches_total"));
    assert!(rendered.contains("status=\"partial\""));
    assert!(rendered.contains("push_dispatch_duration_seconds"));
}

#[test]
fn test_record_without_recorder_does_not_panic() {
    // 同一进程内可能已安装 recorder，也可能没有，两种情况都不应 panic
    record_push_result("NOTIFICATION_TYPE_ASSIGNMENT", 0, 0);
    record_push_dispatch("failed", 1.5);
}
