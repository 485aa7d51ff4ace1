//! Packet forwarding (spec §4.6).

use crate::manager::TunnelManager;
use crate::selector::select;
use tracing::warn;
use tunnelmgr_adapters::TransportDriver;
use tunnelmgr_core::Clock;

/// Select a tunnel for `(hash, repeat)` and hand it `packets` to write.
///
/// Runs entirely under the manager lock (spec §5: `write`/`mtu`/
/// `fragmentation_required` are all cheap enough to call locked, and the
/// whole selection-to-write sequence must observe one consistent `active`
/// set). Returns `false` when there is no tunnel to carry the flow at all
/// (empty `active`, a selected record with no open driver session, or a
/// zero MTU); returns `true` once the packets are handed off, whether that
/// meant writing them or notifying the driver they need fragmenting
/// upstream.
pub fn forward<D, C>(
    manager: &TunnelManager<D, C>,
    primary_packet: &[u8],
    packets: &[&[u8]],
    hash: u64,
    repeat: u32,
    configured_mtu: u16,
) -> bool
where
    D: TransportDriver,
    C: Clock,
{
    manager.lock_state_mut(|state| {
        let Some(id) = select(state, hash, repeat) else {
            warn!("forward: no active tunnels");
            return false;
        };

        let rec = state
            .active
            .iter()
            .find(|r| r.lock().id == id)
            .expect("select only returns ids present in active")
            .clone();
        let Some(handle) = rec.lock().driver.clone() else {
            return false;
        };

        let mtu = manager.driver().mtu(&handle, configured_mtu);
        if mtu == 0 {
            return false;
        }

        let needs_fragmentation = packets
            .iter()
            .any(|pkt| ipv4_total_length(pkt).map(|len| len > mtu).unwrap_or(false));
        if needs_fragmentation {
            manager
                .driver()
                .fragmentation_required(&handle, mtu, primary_packet);
            return true;
        }

        for packet in packets {
            let _ = manager.driver().write(&handle, packet);
        }
        true
    })
}

/// Total-length field of an IPv4 header, or `None` if the packet is too
/// short to contain one (treated as never needing fragmentation).
fn ipv4_total_length(packet: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = packet.get(2..4)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ManagerConfig, TunnelManager};
    use tunnelmgr_adapters::FakeTransportDriver;
    use tunnelmgr_core::{SystemClock, TunnelId, TunnelRecord, TunnelState, INIT_AGE};

    fn ipv4_packet(total_len: u16) -> Vec<u8> {
        let mut pkt = vec![0u8; 20];
        pkt[2..4].copy_from_slice(&total_len.to_be_bytes());
        pkt
    }

    fn manager_with_one_active(
        driver: &FakeTransportDriver,
    ) -> TunnelManager<FakeTransportDriver, SystemClock> {
        let config = ManagerConfig::new(std::env::temp_dir().join("forward-test-cache"));
        let manager = TunnelManager::new(driver.clone(), SystemClock, config);
        manager.lock_state_mut(|state| {
            let mut rec = TunnelRecord::new("cktp://a", TunnelId(0), INIT_AGE);
            rec.state = TunnelState::Open;
            rec.driver = Some(tunnelmgr_adapters::FakeHandle(1));
            state.active.insert(rec);
        });
        manager
    }

    #[test]
    fn no_active_tunnels_fails_forward() {
        let driver = FakeTransportDriver::new();
        let config = ManagerConfig::new(std::env::temp_dir().join("forward-test-empty"));
        let manager = TunnelManager::new(driver, SystemClock, config);
        let pkt = ipv4_packet(40);
        assert!(!forward(&manager, &pkt, &[&pkt], 0, 0, 1400));
    }

    #[test]
    fn small_packet_is_written_directly() {
        let driver = FakeTransportDriver::new();
        driver.set_mtu(1400);
        let manager = manager_with_one_active(&driver);
        let pkt = ipv4_packet(40);
        assert!(forward(&manager, &pkt, &[&pkt], 0, 0, 1400));
        assert!(driver
            .calls()
            .iter()
            .any(|c| matches!(c, tunnelmgr_adapters::TransportCall::Write { .. })));
    }

    #[test]
    fn oversized_packet_requests_fragmentation_instead_of_writing() {
        let driver = FakeTransportDriver::new();
        driver.set_mtu(500);
        let manager = manager_with_one_active(&driver);
        let pkt = ipv4_packet(1000);
        assert!(forward(&manager, &pkt, &[&pkt], 0, 0, 1400));
        let calls = driver.calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, tunnelmgr_adapters::TransportCall::FragmentationRequired { .. })));
        assert!(!calls
            .iter()
            .any(|c| matches!(c, tunnelmgr_adapters::TransportCall::Write { .. })));
    }

    #[test]
    fn zero_mtu_fails_forward_without_writing() {
        let driver = FakeTransportDriver::new();
        driver.set_mtu(0);
        let manager = manager_with_one_active(&driver);
        let pkt = ipv4_packet(40);
        assert!(!forward(&manager, &pkt, &[&pkt], 0, 0, 1400));
        assert!(driver.calls().is_empty());
    }
}
