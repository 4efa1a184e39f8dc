use log::{error, info};

use ov2710_sensor::mock::MockRig;
use ov2710_sensor::{FormatWhich, SensorConfig};

/// モックハードウェア上でセンサーを一通り動かすブリングアップ
fn main() -> anyhow::Result<()> {
    env_logger::init();

    // 設定ファイル読み込み
    let config = SensorConfig::load().map_err(|e| {
        error!("設定ファイルの読み込みに失敗しました: {}", e);
        anyhow::anyhow!("設定ファイルの読み込みエラー: {}", e)
    })?;
    info!(
        "xvclk={} Hz, i2c=0x{:02x}, retries={}",
        config.xvclk_hz, config.i2c_address, config.bus_max_retries
    );

    // センサー接続（チップID確認）
    let rig = MockRig::new(true);
    let sensor = rig
        .attach(&config)
        .map_err(|e| anyhow::anyhow!("センサーの接続に失敗: {}", e))?;

    info!("電源を投入します");
    sensor.power(true)?;

    let fmt = sensor.set_format(1280, 720, FormatWhich::Active)?;
    info!(
        "フォーマット: {}x{} {:?} (0x{:04x})",
        fmt.width,
        fmt.height,
        fmt.code,
        fmt.code.media_bus_code()
    );

    info!("ストリーミングを開始します");
    sensor.set_stream(true)?;
    info!("ゲイン={} 露出={}", sensor.gain()?, sensor.exposure()?);

    info!("サスペンド/レジュームを確認します");
    sensor.suspend();
    sensor.resume()?;
    info!("状態: {:?}", sensor.state());

    sensor.detach();
    info!(
        "完了: レジスタ書き込み {} 回, 電源イベント {:?}",
        rig.bus.write_count(),
        rig.power.get_events()
    );
    Ok(())
}
