// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for clamping and sampling depth maps

use depth_sample::constants::legacy;
use depth_sample::depth::{
    DepthBuffer, DepthData, DepthDataType, DepthReading, SampleStrategy, clamp_and_sample,
};
use depth_sample::errors::DepthError;

/// Unique value per cell so a read can be traced back to its position
fn marker(row: u32, column: u32) -> f32 {
    (row * 1000 + column) as f32 / 1_000_000.0
}

#[test]
fn test_clamp_bounds_every_value() {
    let values = [-3.0, -0.0, 0.0, 0.25, 0.5, 1.0, 1.5, f32::INFINITY, f32::NEG_INFINITY, f32::NAN];
    let mut buffer = DepthBuffer::from_vec(5, 2, values.to_vec()).unwrap();
    buffer.clamp();

    assert!(buffer.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(
        buffer.as_slice(),
        &[0.0, 0.0, 0.0, 0.25, 0.5, 1.0, 1.0, 1.0, 0.0, 0.0]
    );

    let once = buffer.clone();
    buffer.clamp();
    assert_eq!(buffer, once, "clamp should be idempotent");
}

#[test]
fn test_legacy_dimensions_read_row_160_column_120() {
    let buffer = DepthBuffer::from_fn(legacy::DEPTH_WIDTH, legacy::DEPTH_HEIGHT, marker).unwrap();
    assert_eq!(buffer.get_depth(legacy::CENTER_INDEX).unwrap(), marker(160, 120) as f64);

    for strategy in SampleStrategy::ALL {
        let point = strategy.sample(&buffer).unwrap();
        assert_eq!((point.row, point.column), (160, 120), "{}", strategy);
    }
}

#[test]
fn test_center_follows_dimensions() {
    for (width, height) in [(640, 480), (480, 640), (320, 240), (7, 5)] {
        let buffer = DepthBuffer::from_fn(width, height, marker).unwrap();
        let point = SampleStrategy::Center.sample(&buffer).unwrap();
        assert_eq!((point.row, point.column), (height / 2, width / 2));
        assert_eq!(point.value, marker(height / 2, width / 2) as f64);
    }
}

#[test]
fn test_legacy_index_is_bounds_checked() {
    let small = DepthBuffer::filled(100, 100, 0.5).unwrap();
    assert_eq!(
        SampleStrategy::LegacyFixedIndex.sample(&small),
        Err(DepthError::IndexOutOfRange {
            index: legacy::CENTER_INDEX,
            len: 10_000
        })
    );
    assert!(small.get_depth(usize::MAX).is_err());
}

#[test]
fn test_millimeters_end_to_end() {
    // 500 mm -> 2.0 disparity -> clamped to 1.0; 4000 mm -> 0.25; 0 mm -> invalid -> 0.0
    let mut data = vec![500u16; 9];
    data[4] = 4000;
    data[0] = 0;
    let depth = DepthData::millimeters(3, 3, data).unwrap();
    assert_eq!(depth.data_type(), DepthDataType::DepthMillimeters16);

    let (buffer, point) = clamp_and_sample(depth, SampleStrategy::Center).unwrap();
    assert_eq!(point.value, 0.25);
    assert_eq!(buffer.get(0, 0), Some(0.0));
    assert_eq!(buffer.get(2, 2), Some(1.0));
}

#[test]
fn test_wrong_payload_size_is_rejected() {
    assert_eq!(
        DepthBuffer::from_vec(240, 320, vec![0.0; 100]),
        Err(DepthError::SizeMismatch {
            expected: 76_800,
            actual: 100
        })
    );
}

#[test]
fn test_clamped_labels_on_legacy_map() {
    for (fill, expected) in [(5.0, "1.0"), (-3.0, "0.0"), (0.5, "0.5")] {
        let disparity =
            DepthBuffer::filled(legacy::DEPTH_WIDTH, legacy::DEPTH_HEIGHT, fill).unwrap();
        let (buffer, point) =
            clamp_and_sample(DepthData::Disparity(disparity), SampleStrategy::LegacyFixedIndex)
                .unwrap();
        let reading = DepthReading::new(point, &buffer, 1);
        assert_eq!(reading.label(), expected, "fill {}", fill);
    }
}
