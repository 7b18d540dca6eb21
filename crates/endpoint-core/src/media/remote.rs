//! SDP-bearing channel for connections facing a remote peer.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EndpointError, Result};
use crate::types::ConnectionOptions;

use super::{ChannelStats, DirectionFlags, MediaChannel};

const LOCAL_ADDRESS: &str = "127.0.0.1";

pub struct RemoteChannel {
    port: u16,
    session_id: u64,
    local_sdp: Mutex<String>,
    remote_sdp: Mutex<Option<String>>,
    flags: Mutex<DirectionFlags>,
    loopback: AtomicBool,
    stats: Mutex<ChannelStats>,
}

impl RemoteChannel {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            session_id: rand::thread_rng().gen(),
            local_sdp: Mutex::new(String::new()),
            remote_sdp: Mutex::new(None),
            flags: Mutex::new(DirectionFlags::default()),
            loopback: AtomicBool::new(false),
            stats: Mutex::new(ChannelStats::default()),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_loopback(&self) -> bool {
        self.loopback.load(Ordering::SeqCst)
    }

    pub fn flags(&self) -> DirectionFlags {
        *self.flags.lock()
    }

    fn generate_sdp(&self, options: &ConnectionOptions) -> String {
        let codecs: Vec<(&str, &str)> = if options.codecs.iter().any(|c| c == "PCMA") && !options.codecs.iter().any(|c| c == "PCMU") {
            vec![("8", "PCMA/8000")]
        } else {
            vec![("0", "PCMU/8000"), ("8", "PCMA/8000")]
        };
        let payloads: Vec<&str> = codecs.iter().map(|(pt, _)| *pt).collect();
        let mut sdp = format!(
            "v=0\r\no=- {} 1 IN IP4 {addr}\r\ns=-\r\nc=IN IP4 {addr}\r\nt=0 0\r\nm=audio {} RTP/AVP {}\r\n",
            self.session_id,
            self.port,
            payloads.join(" "),
            addr = LOCAL_ADDRESS,
        );
        for (pt, rtpmap) in codecs {
            sdp.push_str(&format!("a=rtpmap:{} {}\r\n", pt, rtpmap));
        }
        if let Some(period) = options.packetization_period {
            sdp.push_str(&format!("a=ptime:{}\r\n", period));
        }
        sdp
    }
}

#[async_trait]
impl MediaChannel for RemoteChannel {
    async fn bind(&self, options: &ConnectionOptions) -> Result<String> {
        let sdp = self.generate_sdp(options);
        *self.local_sdp.lock() = sdp.clone();
        Ok(sdp)
    }

    async fn set_remote_description(&self, sdp: &str) -> Result<()> {
        if !sdp.trim_start().starts_with("v=") {
            return Err(EndpointError::UnsupportedDescription);
        }
        *self.remote_sdp.lock() = Some(sdp.to_string());
        Ok(())
    }

    async fn describe(&self) -> Result<String> {
        Ok(self.local_sdp.lock().clone())
    }

    async fn update_mode(&self, flags: DirectionFlags) -> Result<()> {
        *self.flags.lock() = flags;
        Ok(())
    }

    async fn set_loopback(&self, enabled: bool) -> Result<()> {
        self.loopback.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn join(&self, _peer: Arc<dyn MediaChannel>) -> Result<()> {
        Err(EndpointError::Channel(
            "remote channel cannot be joined to a local peer".to_string(),
        ))
    }

    async fn unjoin(&self) -> Result<()> {
        Ok(())
    }

    fn is_joined(&self) -> bool {
        false
    }

    fn stats(&self) -> ChannelStats {
        *self.stats.lock()
    }

    fn requires_join(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_produces_an_offer_with_the_allocated_port() {
        let channel = RemoteChannel::new(6100);
        let sdp = channel.bind(&ConnectionOptions::default()).await.unwrap();
        assert!(sdp.starts_with("v=0"));
        assert!(sdp.contains("m=audio 6100 RTP/AVP"));
        assert_eq!(channel.describe().await.unwrap(), sdp);
    }

    #[tokio::test]
    async fn rejects_non_sdp_remote_description() {
        let channel = RemoteChannel::new(6102);
        assert!(matches!(
            channel.set_remote_description("not an sdp").await,
            Err(EndpointError::UnsupportedDescription)
        ));
        assert!(channel.set_remote_description("v=0\r\n").await.is_ok());
    }

    #[tokio::test]
    async fn options_select_codec_and_ptime() {
        let channel = RemoteChannel::new(6104);
        let options = ConnectionOptions::parse("p:20, a:PCMA");
        let sdp = channel.bind(&options).await.unwrap();
        assert!(sdp.contains("RTP/AVP 8\r\n"));
        assert!(sdp.contains("a=ptime:20"));
    }
}
