//! Shared fixtures for the workflow integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use mgw_endpoint_core::media::{ChannelStats, DirectionFlags, MediaChannel};
use mgw_endpoint_core::{ChannelProvider, ConnectionOptions, EndpointError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// A channel that binds fine but refuses every mode update, for driving the
/// creation workflow into its rollback path at the mode step.
pub struct ModeRejectingChannel;

#[async_trait]
impl MediaChannel for ModeRejectingChannel {
    async fn bind(&self, _options: &ConnectionOptions) -> mgw_endpoint_core::Result<String> {
        Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nc=IN IP4 127.0.0.1\r\nt=0 0\r\nm=audio 6000 RTP/AVP 0\r\n".to_string())
    }

    async fn set_remote_description(&self, sdp: &str) -> mgw_endpoint_core::Result<()> {
        if sdp.starts_with("v=") {
            Ok(())
        } else {
            Err(EndpointError::UnsupportedDescription)
        }
    }

    async fn describe(&self) -> mgw_endpoint_core::Result<String> {
        self.bind(&ConnectionOptions::default()).await
    }

    async fn update_mode(&self, _flags: DirectionFlags) -> mgw_endpoint_core::Result<()> {
        Err(EndpointError::Channel("mode refused".to_string()))
    }

    async fn set_loopback(&self, _enabled: bool) -> mgw_endpoint_core::Result<()> {
        Ok(())
    }

    async fn join(&self, _peer: Arc<dyn MediaChannel>) -> mgw_endpoint_core::Result<()> {
        Ok(())
    }

    async fn unjoin(&self) -> mgw_endpoint_core::Result<()> {
        Ok(())
    }

    fn is_joined(&self) -> bool {
        false
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats::default()
    }

    fn requires_join(&self) -> bool {
        false
    }
}

pub struct ModeRejectingProvider;

impl ChannelProvider for ModeRejectingProvider {
    fn create_channel(&self, _is_local: bool) -> Arc<dyn MediaChannel> {
        Arc::new(ModeRejectingChannel)
    }
}

pub const REMOTE_SDP: &str = "v=0\r\no=- 1 1 IN IP4 192.0.2.1\r\ns=-\r\nc=IN IP4 192.0.2.1\r\nt=0 0\r\nm=audio 4000 RTP/AVP 0\r\n";
