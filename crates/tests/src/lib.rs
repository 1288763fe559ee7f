//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - Mock 引擎上的帧循环场景（无需渲染引擎）
//! - 配置到发布的端到端流程

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::{ChannelKind, ChannelMask};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_default_stream_names() {
        let names: Vec<&str> = ChannelKind::ALL
            .iter()
            .map(ChannelKind::default_stream_name)
            .collect();
        assert_eq!(names, ["/rgb", "/depth", "/segmentation", "/opticalflow"]);
        assert_eq!(ChannelMask::default(), ChannelMask::COLOR_ONLY);
    }
}

#[cfg(test)]
mod scenario_tests;

#[cfg(test)]
mod e2e_tests;
