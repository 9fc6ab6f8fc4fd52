//! Reconciliation rules, tested without any I/O or sockets.

use rehome_client::reconcile::{self, DEDICATED_MEDIA_DCS};
use rehome_client::store::{EndpointState, Field};
use rehome_tl::types::DcOption;

fn opt(id: i32, ip: &str, port: i32) -> DcOption {
    DcOption {
        ipv6: false,
        media_only: false,
        this_port_only: false,
        id,
        ip_address: ip.to_string(),
        port,
    }
}

fn fresh(dc_id: i32, test_mode: bool) -> EndpointState {
    let mut state = EndpointState::bootstrap(1, test_mode, "10.0.0.1".to_string(), 443);
    state.dc_id = dc_id;
    state
}

#[test]
fn single_option_updates_server_fields_only() {
    // DC 1 was active; the server redirects to DC 2 and advertises one
    // production option with a pinned port.
    let mut state = fresh(1, false);
    state.media_address = Some("10.0.0.9".to_string());
    let options = vec![DcOption { this_port_only: true, ..opt(2, "2.2.2.2", 443) }];

    let writes = reconcile::apply_dc_options(&mut state, 2, &options);

    assert_eq!(state.server_address.as_deref(), Some("2.2.2.2"));
    assert_eq!(state.server_port, Some(443));
    // DC 2 keeps dedicated media endpoints; no option wrote them, so the
    // pre-existing media address survives untouched.
    assert_eq!(state.media_address.as_deref(), Some("10.0.0.9"));
    assert_eq!(writes, vec![Field::ServerAddress, Field::ServerPort]);
}

#[test]
fn later_matches_overwrite_earlier_ones_per_field() {
    let mut state = fresh(2, false);
    let options = vec![
        opt(2, "1.1.1.1", 443),
        DcOption { this_port_only: true, ..opt(2, "2.2.2.2", 8443) },
        opt(2, "3.3.3.3", 443),
    ];

    reconcile::apply_dc_options(&mut state, 2, &options);

    // The address comes from the last match, the port from the only option
    // that pinned one. Fields are not coupled across options.
    assert_eq!(state.server_address.as_deref(), Some("3.3.3.3"));
    assert_eq!(state.server_port, Some(8443));
}

#[test]
fn options_for_other_dcs_are_ignored() {
    let mut state = fresh(3, false);
    let before = state.clone();
    let options = vec![opt(1, "1.1.1.1", 443), opt(2, "2.2.2.2", 443)];

    let writes = reconcile::apply_dc_options(&mut state, 3, &options);

    // No matching option, but the media-mirror rule still runs for DC 3.
    assert_eq!(state.server_address, before.server_address);
    assert_eq!(state.media_address, state.server_address);
    assert_eq!(writes, vec![Field::MediaAddress, Field::MediaAddressV6, Field::MediaPort]);
}

#[test]
fn ipv6_and_media_options_route_to_their_fields() {
    let mut state = fresh(2, false);
    let options = vec![
        opt(2, "2.2.2.2", 443),
        DcOption { ipv6: true, ..opt(2, "2001:db8::2", 443) },
        DcOption { media_only: true, this_port_only: true, ..opt(2, "2.2.2.3", 8443) },
        DcOption { media_only: true, ipv6: true, ..opt(2, "2001:db8::3", 443) },
    ];

    reconcile::apply_dc_options(&mut state, 2, &options);

    assert_eq!(state.server_address.as_deref(), Some("2.2.2.2"));
    assert_eq!(state.server_address_v6.as_deref(), Some("2001:db8::2"));
    assert_eq!(state.media_address.as_deref(), Some("2.2.2.3"));
    assert_eq!(state.media_port, Some(8443));
    assert_eq!(state.media_address_v6.as_deref(), Some("2001:db8::3"));
}

#[test]
fn media_mirrors_server_outside_dedicated_dcs() {
    for dc in [1, 3, 5] {
        assert!(!DEDICATED_MEDIA_DCS.contains(&dc));
        let mut state = fresh(dc, false);
        let options = vec![
            DcOption { this_port_only: true, ..opt(dc, "9.9.9.9", 8443) },
            DcOption { media_only: true, ..opt(dc, "9.9.9.10", 443) },
        ];

        reconcile::apply_dc_options(&mut state, dc, &options);

        // The media option was applied first and then overwritten by the
        // mirror rule: these DCs never keep dedicated media endpoints.
        assert_eq!(state.media_address, state.server_address);
        assert_eq!(state.media_address_v6, state.server_address_v6);
        assert_eq!(state.media_port, state.server_port);
        assert_eq!(state.media_port, Some(8443));
    }
}

#[test]
fn dedicated_media_survives_in_production_only() {
    for dc in DEDICATED_MEDIA_DCS {
        let options = vec![
            opt(dc, "4.4.4.4", 443),
            DcOption { media_only: true, ..opt(dc, "4.4.4.5", 443) },
        ];

        let mut prod = fresh(dc, false);
        reconcile::apply_dc_options(&mut prod, dc, &options);
        assert_eq!(prod.media_address.as_deref(), Some("4.4.4.5"));

        // Same table in test mode: the mirror rule wins.
        let mut test = fresh(dc, true);
        reconcile::apply_dc_options(&mut test, dc, &options);
        assert_eq!(test.media_address.as_deref(), Some("4.4.4.4"));
    }
}

#[test]
fn out_of_range_ports_are_skipped_not_wrapped() {
    let mut state = fresh(2, false);
    let options = vec![
        DcOption { this_port_only: true, ..opt(2, "2.2.2.2", 70_000) },
        DcOption { this_port_only: true, ..opt(2, "2.2.2.3", -1) },
        DcOption { media_only: true, this_port_only: true, ..opt(2, "2.2.2.4", 1 << 20) },
    ];

    let writes = reconcile::apply_dc_options(&mut state, 2, &options);

    // Addresses still apply; none of the malformed ports is written, and in
    // particular 70_000 does not wrap to 4_464.
    assert_eq!(state.server_address.as_deref(), Some("2.2.2.3"));
    assert_eq!(state.media_address.as_deref(), Some("2.2.2.4"));
    assert_eq!(state.server_port, Some(443));
    assert_eq!(state.media_port, None);
    assert!(!writes.contains(&Field::ServerPort));
    assert!(!writes.contains(&Field::MediaPort));
}

#[test]
fn reapplying_the_same_table_is_idempotent() {
    let mut state = fresh(5, false);
    let options = vec![
        DcOption { this_port_only: true, ..opt(5, "5.5.5.5", 443) },
        DcOption { ipv6: true, ..opt(5, "2001:db8::5", 443) },
    ];

    reconcile::apply_dc_options(&mut state, 5, &options);
    let after_first = state.clone();
    let writes = reconcile::apply_dc_options(&mut state, 5, &options);

    assert!(state == after_first);
    // Writes are still reported; idempotence is about values, not I/O.
    assert!(writes.contains(&Field::ServerAddress));
}
