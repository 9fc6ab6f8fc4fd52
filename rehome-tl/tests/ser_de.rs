use rehome_tl::{enums, functions, types, Deserializable, Identifiable, Serializable};

// ── Primitive round-trips ─────────────────────────────────────────────────────

#[test]
fn roundtrip_i32() {
    for v in [0i32, -1, i32::MAX, i32::MIN, 42] {
        let bytes = v.to_bytes();
        assert_eq!(i32::from_bytes(&bytes).unwrap(), v);
    }
}

#[test]
fn roundtrip_bool_true() {
    let bytes = true.to_bytes();
    assert_eq!(bytes, 0x997275b5u32.to_le_bytes());
    assert_eq!(bool::from_bytes(&bytes).unwrap(), true);
}

#[test]
fn roundtrip_bool_false() {
    let bytes = false.to_bytes();
    assert_eq!(bytes, 0xbc799737u32.to_le_bytes());
    assert_eq!(bool::from_bytes(&bytes).unwrap(), false);
}

// ── String / bytes ────────────────────────────────────────────────────────────

#[test]
fn roundtrip_short_string() {
    let s = "hello world".to_owned();
    let bytes = s.to_bytes();
    assert_eq!(bytes.len() % 4, 0, "must be 4-byte aligned");
    assert_eq!(String::from_bytes(&bytes).unwrap(), s);
}

#[test]
fn roundtrip_long_string() {
    // >253 bytes triggers the 4-byte length header path
    let s = "x".repeat(300);
    let bytes = s.clone().to_bytes();
    assert_eq!(bytes.len() % 4, 0, "must be 4-byte aligned");
    assert_eq!(String::from_bytes(&bytes).unwrap(), s);
}

#[test]
fn roundtrip_bytes_vec() {
    let v: Vec<u8> = (0u8..=255).collect();
    let bytes = v.clone().to_bytes();
    assert_eq!(Vec::<u8>::from_bytes(&bytes).unwrap(), v);
}

// ── Cursor EOF detection ──────────────────────────────────────────────────────

#[test]
fn deserialize_truncated_returns_eof() {
    use rehome_tl::deserialize::Error;
    let result = i32::from_bytes(&[0x01, 0x02]); // only 2 bytes, need 4
    assert_eq!(result, Err(Error::UnexpectedEof));
}

// ── Constructors ──────────────────────────────────────────────────────────────

#[test]
fn dc_option_flags_bits() {
    let opt = types::DcOption {
        ipv6: false,
        media_only: true,
        this_port_only: true,
        id: 4,
        ip_address: "10.0.0.4".into(),
        port: 443,
    };
    let bytes = opt.to_bytes();
    // flags word is first: media_only = bit 1, this_port_only = bit 2
    assert_eq!(&bytes[..4], &0b110u32.to_le_bytes());
    assert_eq!(types::DcOption::from_bytes(&bytes).unwrap(), opt);
}

#[test]
fn config_with_multiple_options() {
    let config = types::Config {
        date: 1_700_000_000,
        this_dc: 2,
        dc_options: vec![
            types::DcOption {
                ipv6: false,
                media_only: false,
                this_port_only: false,
                id: 1,
                ip_address: "10.0.0.1".into(),
                port: 443,
            },
            types::DcOption {
                ipv6: true,
                media_only: false,
                this_port_only: false,
                id: 1,
                ip_address: "2001:db8::1".into(),
                port: 443,
            },
        ],
    };
    assert_eq!(types::Config::from_bytes(&config.to_bytes()).unwrap(), config);
}

#[test]
fn sent_code_timeout_present_and_absent() {
    let with = types::SentCode { phone_code_hash: "f00d".into(), timeout: Some(30) };
    let without = types::SentCode { phone_code_hash: "f00d".into(), timeout: None };

    let with_bytes = with.to_bytes();
    let without_bytes = without.to_bytes();
    assert_eq!(with_bytes.len(), without_bytes.len() + 4);

    assert_eq!(types::SentCode::from_bytes(&with_bytes).unwrap(), with);
    assert_eq!(types::SentCode::from_bytes(&without_bytes).unwrap(), without);
}

#[test]
fn function_serializes_own_constructor_id() {
    let req = functions::GetConfig {};
    let bytes = req.to_bytes();
    assert_eq!(bytes, functions::GetConfig::CONSTRUCTOR_ID.to_le_bytes());
}

#[test]
fn dh_answer_dispatches_on_constructor_id() {
    let done = enums::DhAnswer::Done(types::DhDone {
        nonce: [1; 16],
        server_nonce: [2; 16],
        key_check: [3; 16],
    });
    let bytes = done.to_bytes();
    assert_eq!(&bytes[..4], &types::DhDone::CONSTRUCTOR_ID.to_le_bytes());
    assert_eq!(enums::DhAnswer::from_bytes(&bytes).unwrap(), done);

    let abort = enums::DhAnswer::Abort(types::DhAbort {
        nonce: [1; 16],
        server_nonce: [2; 16],
    });
    assert_eq!(enums::DhAnswer::from_bytes(&abort.to_bytes()).unwrap(), abort);
}

#[test]
fn dh_answer_rejects_unknown_constructor() {
    use rehome_tl::deserialize::Error;
    let bytes = 0xdeadbeefu32.to_le_bytes();
    assert_eq!(
        enums::DhAnswer::from_bytes(&bytes),
        Err(Error::UnexpectedConstructor { id: 0xdeadbeef })
    );
}
