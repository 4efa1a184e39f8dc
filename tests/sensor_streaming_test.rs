//! ストリーミング状態機械の結合テスト
//!
//! モックのレジスタバスと電源制御の上でセンサーを動かし、
//! 実際にバスへ出た書き込みを検証します。

use std::sync::Arc;
use std::thread;

use ov2710_sensor::hardware::camera::ov2710_regs::{
    STREAM_CTRL, STREAM_CTRL_STANDBY, TIMING_FORMAT1, TIMING_FORMAT2,
};
use ov2710_sensor::mock::{MockRig, MockSensor};
use ov2710_sensor::{BayerOrder, ErrorKind, FormatWhich, ModeId, SensorConfig, SensorState};

fn powered_sensor(reset_line: bool) -> (MockSensor, MockRig) {
    let rig = MockRig::new(reset_line);
    let sensor = rig.attach(&SensorConfig::default()).unwrap();
    sensor.power(true).unwrap();
    (sensor, rig)
}

#[test]
fn test_stream_on_twice_writes_once() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_stream(true).unwrap();
    sensor.set_stream(false).unwrap();

    // モード適用済みの状態から2回開始する
    rig.bus.clear_log();
    sensor.set_stream(true).unwrap();
    sensor.set_stream(true).unwrap();

    assert_eq!(rig.bus.writes_to(STREAM_CTRL), vec![vec![0x02]]);
    assert_eq!(rig.bus.write_count(), 1);
    assert_eq!(sensor.state(), SensorState::Streaming);
}

#[test]
fn test_second_stream_on_touches_nothing() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_stream(true).unwrap();

    rig.bus.clear_log();
    sensor.set_stream(true).unwrap();
    assert!(rig.bus.get_log().is_empty());
}

#[test]
fn test_pending_mode_applied_on_stream_on() {
    let (sensor, rig) = powered_sensor(true);
    sensor
        .set_format(1280, 720, FormatWhich::Active)
        .unwrap();
    assert!(sensor.mode_pending());

    rig.bus.clear_log();
    sensor.set_stream(true).unwrap();

    let writes = rig.bus.write_sequence();
    let table = ModeId::Mode720p1280x720.descriptor().regs;
    // テーブルの先頭 (0x3103) から順に全行が書かれている
    let start = writes
        .iter()
        .position(|w| *w == (table[0].reg, table[0].value))
        .unwrap();
    for (offset, entry) in table.iter().enumerate() {
        assert_eq!(writes[start + offset], (entry.reg, entry.value));
    }
    // 最後はストリーム開始。開始の書き込みはこの1回だけ
    assert_eq!(writes.last(), Some(&(STREAM_CTRL, 0x02)));
    let enables = writes.iter().filter(|w| **w == (STREAM_CTRL, 0x02)).count();
    assert_eq!(enables, 1);
    assert!(!sensor.mode_pending());
}

#[test]
fn test_power_on_leaves_sensor_in_standby() {
    let (sensor, rig) = powered_sensor(false);
    assert_eq!(sensor.state(), SensorState::Idle);
    assert_eq!(rig.bus.register(STREAM_CTRL), STREAM_CTRL_STANDBY);

    // Idle 中の反転はストリームを止めた状態で行われる
    sensor.set_hflip(true).unwrap();
    assert_eq!(rig.bus.register(STREAM_CTRL), STREAM_CTRL_STANDBY);

    sensor.set_stream(true).unwrap();
    assert_eq!(rig.bus.register(STREAM_CTRL), 0x02);
    sensor.set_stream(false).unwrap();
    assert_eq!(rig.bus.register(STREAM_CTRL), STREAM_CTRL_STANDBY);
}

#[test]
fn test_power_cycle_reprograms_same_table() {
    let (sensor, rig) = powered_sensor(false);
    sensor
        .set_format(1280, 720, FormatWhich::Active)
        .unwrap();

    rig.bus.clear_log();
    sensor.set_stream(true).unwrap();
    let first = rig.bus.write_sequence();

    sensor.set_stream(false).unwrap();
    sensor.power(false).unwrap();
    assert_eq!(sensor.state(), SensorState::Off);
    sensor.power(true).unwrap();
    assert!(sensor.mode_pending());

    rig.bus.clear_log();
    sensor.set_stream(true).unwrap();
    let second = rig.bus.write_sequence();

    assert_eq!(first, second);
    assert_eq!(sensor.current_mode(), ModeId::Mode720p1280x720);
}

#[test]
fn test_flip_busy_while_streaming() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_stream(true).unwrap();
    let before = sensor.get_format().code;

    rig.bus.clear_log();
    assert_eq!(sensor.set_hflip(true).unwrap_err().kind(), ErrorKind::Busy);
    assert_eq!(sensor.set_vflip(true).unwrap_err().kind(), ErrorKind::Busy);

    assert_eq!(sensor.get_format().code, before);
    assert!(rig.bus.writes_to(TIMING_FORMAT1).is_empty());
    assert!(rig.bus.writes_to(TIMING_FORMAT2).is_empty());
}

#[test]
fn test_flip_survives_mode_table() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_hflip(true).unwrap();
    sensor
        .set_format(1280, 720, FormatWhich::Active)
        .unwrap();

    // 720p テーブルは反転ビットを落とすが、開始時に書き戻される
    sensor.set_stream(true).unwrap();
    assert_eq!(rig.bus.register(TIMING_FORMAT2) & 0x04, 0x04);
    assert_eq!(sensor.get_format().code, BayerOrder::Grbg);
}

#[test]
fn test_table_failure_keeps_mode_pending() {
    let (sensor, rig) = powered_sensor(true);
    sensor
        .set_format(1280, 720, FormatWhich::Active)
        .unwrap();

    rig.bus.set_fail_writes_to(Some(0x3017));
    let err = sensor.set_stream(true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("mode_720p_1280_720"));
    assert!(sensor.mode_pending());
    assert_eq!(sensor.state(), SensorState::Idle);

    rig.bus.set_fail_writes_to(None);
    sensor.set_stream(true).unwrap();
    assert!(!sensor.mode_pending());
}

#[test]
fn test_suspend_resume_restarts_stream() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_stream(true).unwrap();

    rig.bus.clear_log();
    sensor.suspend();
    assert_eq!(sensor.state(), SensorState::Idle);
    assert_eq!(rig.bus.writes_to(STREAM_CTRL), vec![vec![0x42]]);

    sensor.resume().unwrap();
    assert_eq!(sensor.state(), SensorState::Streaming);
    assert_eq!(
        rig.bus.writes_to(STREAM_CTRL),
        vec![vec![0x42], vec![0x02]]
    );
}

#[test]
fn test_resume_without_stream_is_noop() {
    let (sensor, rig) = powered_sensor(true);

    rig.bus.clear_log();
    sensor.suspend();
    sensor.resume().unwrap();
    assert!(rig.bus.get_log().is_empty());
    assert_eq!(sensor.state(), SensorState::Idle);
}

#[test]
fn test_resume_failure_leaves_stream_off() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_stream(true).unwrap();
    sensor.suspend();

    rig.bus.fail_next_transfers(1);
    let err = sensor.resume().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(sensor.state(), SensorState::Idle);
    // 失敗後に停止を書き込む
    assert_eq!(rig.bus.writes_to(STREAM_CTRL).last(), Some(&vec![0x42]));
}

#[test]
fn test_shared_across_threads() {
    let (sensor, rig) = powered_sensor(true);
    sensor.set_auto_gain(false).unwrap();
    let sensor = Arc::new(sensor);

    let handles: Vec<_> = (0..4u16)
        .map(|i| {
            let sensor = Arc::clone(&sensor);
            thread::spawn(move || {
                for _ in 0..10 {
                    sensor.set_gain(100 + i).unwrap();
                    // 他のスレッドがストリーミング中なら Busy
                    if let Err(e) = sensor.set_format(1280, 720, FormatWhich::Active) {
                        assert_eq!(e.kind(), ErrorKind::Busy);
                    }
                    sensor.set_stream(i % 2 == 0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    sensor.set_stream(true).unwrap();
    assert_eq!(sensor.state(), SensorState::Streaming);
    assert!(!sensor.mode_pending());
    assert_eq!(sensor.current_mode(), ModeId::Mode720p1280x720);
    assert_eq!(sensor.get_format().width, 1280);
    assert_eq!(rig.bus.register(STREAM_CTRL), 0x02);

    // 手動ゲインはストリーミング中でもそのまま書き込める
    sensor.set_gain(321).unwrap();
    assert_eq!(sensor.gain().unwrap(), 321);

    sensor.set_stream(false).unwrap();
    assert_eq!(sensor.state(), SensorState::Idle);
}
