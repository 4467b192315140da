#![allow(dead_code)]

use bytes::BytesMut;
use rawsocket::frame::FrameHeader;
use rawsocket::{mask, Opcode, WebSocket, WebSocketConfig};
use tokio::io::{duplex, AsyncReadExt, DuplexStream};

pub const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Two engines talking to each other
pub fn engine_pair(client: WebSocketConfig, server: WebSocketConfig) -> (WebSocket, WebSocket) {
    let (a, b) = duplex(DUPLEX_CAPACITY);
    (
        WebSocket::new(a, client).unwrap(),
        WebSocket::new(b, server).unwrap(),
    )
}

/// An engine plus the raw peer end of its stream
pub fn engine_with_peer(config: WebSocketConfig) -> (WebSocket, DuplexStream) {
    let (a, b) = duplex(DUPLEX_CAPACITY);
    (WebSocket::new(a, config).unwrap(), b)
}

/// Encode one complete frame, masked when `mask_key` is given
pub fn frame(opcode: Opcode, fin: bool, payload: &[u8], mask_key: Option<u32>) -> Vec<u8> {
    let mut header = FrameHeader::new(opcode, fin, payload.len() as u64);
    match mask_key {
        Some(key) => {
            header = header.with_mask(key);
            mask::merge_and_mask(key, &header.encode(), payload).to_vec()
        }
        None => {
            let mut buf = BytesMut::new();
            header.write_to(&mut buf);
            buf.extend_from_slice(payload);
            buf.to_vec()
        }
    }
}

/// Read one frame off the raw peer end, returning its header and unmasked payload
pub async fn read_frame(peer: &mut DuplexStream) -> (FrameHeader, Vec<u8>) {
    let mut head = vec![0u8; 2];
    peer.read_exact(&mut head).await.unwrap();
    let size = FrameHeader::header_size(head[1]);
    head.resize(size, 0);
    peer.read_exact(&mut head[2..]).await.unwrap();

    let header = FrameHeader::decode(&head).unwrap();
    let mut payload = vec![0u8; header.payload_len as usize];
    peer.read_exact(&mut payload).await.unwrap();
    if let Some(key) = header.mask_key {
        mask::apply_mask(key, &mut payload);
    }
    (header, payload)
}
