// Live sampling of the local machine's sockets. Produces the same outcome
// shape as the capture parser, so both paths share one annotation pipeline.

use netstat2::{
    get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState,
};

use crate::capture::{self, ParseOutcome, Protocol, RawObservation};

/// Snapshot IPv4 TCP and UDP sockets. Read-only; never touches socket state.
pub fn sample_local_sockets() -> anyhow::Result<ParseOutcome> {
    let sockets = get_sockets_info(
        AddressFamilyFlags::IPV4,
        ProtocolFlags::TCP | ProtocolFlags::UDP,
    )?;

    let mut outcome = ParseOutcome::default();
    for socket in sockets {
        match &socket.protocol_socket_info {
            ProtocolSocketInfo::Tcp(tcp) => record_tcp(
                &mut outcome,
                &tcp.local_addr.to_string(),
                tcp.local_port,
                &tcp.remote_addr.to_string(),
                tcp.remote_port,
                tcp.state == TcpState::Listen,
            ),
            // UDP sockets carry no peer; the local address is still worth
            // surfacing as a discovered host.
            ProtocolSocketInfo::Udp(udp) => {
                outcome.note_address(&udp.local_addr.to_string());
            }
        }
    }
    Ok(outcome)
}

/// Fold one TCP socket into the outcome. A listening socket hints at the
/// local address only; a connected one becomes an observation.
fn record_tcp(
    outcome: &mut ParseOutcome,
    local_addr: &str,
    local_port: u16,
    remote_addr: &str,
    remote_port: u16,
    listening: bool,
) {
    outcome.note_address(local_addr);
    if listening {
        return;
    }
    outcome.note_address(remote_addr);
    if capture::is_valid_address(local_addr) && capture::is_valid_address(remote_addr) {
        outcome.observations.push(RawObservation {
            source_addr: local_addr.to_string(),
            dest_addr: remote_addr.to_string(),
            protocol: Some(Protocol::Tcp),
            source_port: Some(local_port.to_string()),
            dest_port: Some(remote_port.to_string()),
        });
    }
}
