use criterion::{criterion_group, criterion_main, Criterion};
use gridmesh_mac::frame::aux::KeyIdMode;
use gridmesh_mac::{
    Address, AuxSecurityHeader, ExtendedAddress, FrameType, FrameVersion, HeaderIe, MacFrame,
    MacHeader, PanId, SecurityLevel, ShortAddress, Transport,
};

fn make_plc_frame() -> MacFrame {
    MacFrame {
        transport: Transport::PowerLine,
        header: MacHeader {
            frame_type: FrameType::Data,
            frame_version: FrameVersion::Ieee2006,
            frame_pending: false,
            ack_request: true,
            sequence_number: 7,
            dest_pan_id: Some(PanId(0x781D)),
            dest_address: Address::Short(ShortAddress(0x0001)),
            src_pan_id: Some(PanId(0x781D)),
            src_address: Address::Short(ShortAddress(0x0002)),
            aux_security: Some(AuxSecurityHeader {
                security_level: SecurityLevel::EncMic32,
                key_id_mode: KeyIdMode::Index,
                frame_counter: 1000,
                key_id: 0,
            }),
        },
        ies: Vec::new(),
        payload: vec![0x5A; 128],
        fcs: 0,
    }
}

fn make_rf_frame() -> MacFrame {
    MacFrame {
        transport: Transport::Radio,
        header: MacHeader {
            frame_type: FrameType::Data,
            frame_version: FrameVersion::Ieee2015,
            frame_pending: false,
            ack_request: false,
            sequence_number: 8,
            dest_pan_id: Some(PanId(0x781D)),
            dest_address: Address::Extended(ExtendedAddress::new([1, 2, 3, 4, 5, 6, 7, 8])),
            src_pan_id: Some(PanId(0x781D)),
            src_address: Address::Extended(ExtendedAddress::new([8, 7, 6, 5, 4, 3, 2, 1])),
            aux_security: None,
        },
        ies: vec![
            HeaderIe::LinkInfo {
                duty_cycle: 20,
                tx_power_offset: 2,
            },
            HeaderIe::ReverseLinkQuality { reverse_lqi: 190 },
        ],
        payload: vec![0xA5; 256],
        fcs: 0,
    }
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    let plc = make_plc_frame();
    let rf = make_rf_frame();
    let plc_raw = plc.encode().unwrap();
    let rf_raw = rf.encode().unwrap();

    group.bench_function("encode_plc", |b| {
        b.iter(|| plc.encode().unwrap());
    });
    group.bench_function("encode_rf_with_ies", |b| {
        b.iter(|| rf.encode().unwrap());
    });
    group.bench_function("decode_plc", |b| {
        b.iter(|| MacFrame::decode(&plc_raw, Transport::PowerLine).unwrap());
    });
    group.bench_function("decode_rf_with_ies", |b| {
        b.iter(|| MacFrame::decode(&rf_raw, Transport::Radio).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
