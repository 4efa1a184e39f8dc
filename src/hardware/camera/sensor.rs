//! OV2710 のストリーミング状態機械
//!
//! `Off → Idle → Streaming → Idle/Off` の遷移と、フォーマット・コントロールの
//! ネゴシエーションを1つのデバイスロックの下で扱います。
//! 公開操作はすべて `&self` を取り、操作の間ずっとロックを保持します。

use std::sync::{Mutex, MutexGuard};

use log::{debug, error, info, warn};

use super::controls::{
    check_exposure, check_gain, check_test_pattern, ControlId, ControlSet, Flip,
};
use super::format::{BayerOrder, Format, FormatWhich, FrameInterval, FrameSizeRange};
use super::modes::{self, ModeId, HEIGHT_MAX, MODES, WIDTH_MAX};
use super::ov2710_regs::{CHIP_ID_HIGH, OV2710_CHIP_ID, REG_VALUE_16BIT};
use super::stream::{stream_disable, stream_enable};
use crate::core::{SensorConfig, EXPECTED_XVCLK_HZ};
use crate::error::{SensorError, SensorResult};
use crate::hardware::registers::RegisterAccess;
use crate::power::PowerSequencer;

/// フレームワークが最初に要求するサイズ
const DEFAULT_REQUEST_WIDTH: u32 = 800;
const DEFAULT_REQUEST_HEIGHT: u32 = 600;

/// センサーの外から見える状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// 電源オフ
    Off,
    /// 電源オン、ストリーム停止中
    Idle,
    Streaming,
}

struct Inner<R, S> {
    regs: R,
    sequencer: S,
    streaming: bool,
    /// suspend 時にストリーミング中だった
    resume_streaming: bool,
    /// 選択中のモードがまだハードウェアに書かれていない
    mode_pending_changes: bool,
    current_mode: ModeId,
    fmt: Format,
    frame_interval: FrameInterval,
    controls: ControlSet,
}

impl<R: RegisterAccess, S: PowerSequencer> Inner<R, S> {
    fn powered(&self) -> bool {
        self.sequencer.is_powered()
    }

    fn state(&self) -> SensorState {
        if !self.powered() {
            SensorState::Off
        } else if self.streaming {
            SensorState::Streaming
        } else {
            SensorState::Idle
        }
    }

    /// 電源投入後、チップIDを確認して電源を落とす
    fn probe(&mut self) -> SensorResult<()> {
        self.sequencer.power_on(&mut self.regs)?;
        let chip_id = self.regs.read_reg(CHIP_ID_HIGH, REG_VALUE_16BIT);
        let off = self.sequencer.power_off();

        let actual = chip_id? as u16;
        if actual != OV2710_CHIP_ID {
            error!("wrong chip id 0x{:04x}", actual);
            return Err(SensorError::ChipIdMismatch {
                actual,
                expected: OV2710_CHIP_ID,
            });
        }
        off
    }

    /// ベースのレジスタセットとコントロール状態を書き戻す
    fn restore(&mut self) -> SensorResult<()> {
        self.mode_pending_changes = true;
        modes::apply(&mut self.regs, modes::INIT_MODE.descriptor())?;
        self.fmt.code = self.controls.setup(&mut self.regs)?;
        Ok(())
    }

    fn power_up(&mut self) -> SensorResult<()> {
        if self.powered() {
            return Ok(());
        }

        self.sequencer.power_on(&mut self.regs)?;
        if let Err(e) = self.restore() {
            error!("restore after power on failed: {}", e);
            if let Err(off_err) = self.sequencer.power_off() {
                warn!("power off after restore failure: {}", off_err);
            }
            return Err(e);
        }

        info!("sensor on, {:?} pending", self.current_mode);
        Ok(())
    }

    fn power_down(&mut self) -> SensorResult<()> {
        if self.streaming {
            if let Err(e) = self.stream_off() {
                warn!("stream off before power down: {}", e);
            }
        }
        self.resume_streaming = false;
        self.sequencer.power_off()?;
        info!("sensor off");
        Ok(())
    }

    /// 選択中のモードをゲイン/露出ポリシーごとハードウェアへ書き込む
    fn mode_set(&mut self) -> SensorResult<()> {
        let mode = self.current_mode.descriptor();
        debug!("applying {}", mode.name);

        self.controls.program_gain(&mut self.regs, false)?;
        self.controls.program_exposure(&mut self.regs, false)?;

        modes::apply(&mut self.regs, mode)?;

        if self.controls.gain.is_auto() {
            self.controls.program_gain(&mut self.regs, true)?;
        }
        if self.controls.exposure.is_auto() {
            self.controls.program_exposure(&mut self.regs, true)?;
        }

        // テーブルが反転ビットを初期化するため書き直す
        self.fmt.code = self.controls.restore_orientation(&mut self.regs)?;
        self.mode_pending_changes = false;
        Ok(())
    }

    fn stream_on(&mut self) -> SensorResult<()> {
        if self.streaming {
            return Ok(());
        }
        if !self.powered() {
            return Err(SensorError::ResourceUnavailable(
                "sensor is powered off".to_string(),
            ));
        }

        if self.mode_pending_changes {
            self.mode_set()?;
        }
        stream_enable(&mut self.regs)?;
        self.streaming = true;
        info!("stream on: {}", self.current_mode.descriptor().name);
        Ok(())
    }

    /// 書き込みに失敗してもストリーム停止扱いにする
    fn stream_off(&mut self) -> SensorResult<()> {
        if !self.streaming {
            return Ok(());
        }

        self.streaming = false;
        stream_disable(&mut self.regs).inspect_err(|e| warn!("stream off failed: {}", e))?;
        info!("stream off");
        Ok(())
    }
}

/// OV2710 センサー
///
/// `R` はレジスタアクセス層、`S` は電源シーケンサ。
pub struct Ov2710<R, S> {
    inner: Mutex<Inner<R, S>>,
}

impl<R: RegisterAccess, S: PowerSequencer> Ov2710<R, S> {
    /// クロックを検証し、チップIDを確認してセンサーを生成する
    ///
    /// 生成後は電源オフ状態。失敗した場合は何も残らない。
    pub fn attach(regs: R, sequencer: S, config: &SensorConfig) -> SensorResult<Self> {
        if config.xvclk_hz != EXPECTED_XVCLK_HZ {
            error!(
                "wrong xvclk frequency {} Hz, expected: {} Hz",
                config.xvclk_hz, EXPECTED_XVCLK_HZ
            );
            return Err(SensorError::ConfigMismatch {
                actual: config.xvclk_hz,
                expected: EXPECTED_XVCLK_HZ,
            });
        }

        let mode = modes::find_nearest(config.initial_width, config.initial_height);
        let mut inner = Inner {
            regs,
            sequencer,
            streaming: false,
            resume_streaming: false,
            mode_pending_changes: true,
            current_mode: mode.id,
            fmt: Format::for_mode(mode, BayerOrder::Bggr),
            frame_interval: FrameInterval::default(),
            controls: ControlSet::default(),
        };

        inner.probe()?;
        info!("ov2710 init correctly");

        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// ストリームを止めて電源を落とし、レジスタ層とシーケンサを返す
    pub fn detach(self) -> (R, S) {
        let mut inner = self
            .inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = inner.power_down() {
            warn!("power down on detach failed: {}", e);
        }
        (inner.regs, inner.sequencer)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R, S>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SensorState {
        self.lock().state()
    }

    pub fn mode_pending(&self) -> bool {
        self.lock().mode_pending_changes
    }

    pub fn current_mode(&self) -> ModeId {
        self.lock().current_mode
    }

    /// 電源のオン/オフ
    pub fn power(&self, on: bool) -> SensorResult<()> {
        let mut inner = self.lock();
        if on {
            inner.power_up()
        } else {
            inner.power_down()
        }
    }

    /// 最も近いモードに解決する。`Active` ならデバイスのフォーマットとして採用する
    pub fn set_format(&self, width: u32, height: u32, which: FormatWhich) -> SensorResult<Format> {
        let mut inner = self.lock();
        if inner.streaming {
            return Err(SensorError::Busy("format change while streaming"));
        }

        let mode = modes::find_nearest(width, height);
        let fmt = Format::for_mode(mode, inner.fmt.code);
        if which == FormatWhich::Active {
            debug!("{}x{} -> {}", width, height, mode.name);
            inner.current_mode = mode.id;
            inner.fmt = fmt;
            inner.mode_pending_changes = true;
        }
        Ok(fmt)
    }

    pub fn get_format(&self) -> Format {
        self.lock().fmt
    }

    /// フレームワーク既定の要求サイズでネゴシエートする
    pub fn init_cfg(&self) -> SensorResult<Format> {
        self.set_format(
            DEFAULT_REQUEST_WIDTH,
            DEFAULT_REQUEST_HEIGHT,
            FormatWhich::Active,
        )
    }

    pub fn enum_mbus_code(&self, index: u32) -> SensorResult<BayerOrder> {
        if index != 0 {
            return Err(SensorError::InvalidArgument(format!(
                "mbus code index {}",
                index
            )));
        }
        Ok(self.lock().fmt.code)
    }

    pub fn enum_frame_size(&self, index: u32) -> SensorResult<FrameSizeRange> {
        let mode = ModeId::from_index(index as usize)
            .map(ModeId::descriptor)
            .ok_or_else(|| SensorError::InvalidArgument(format!("frame size index {}", index)))?;
        Ok(FrameSizeRange {
            min_width: mode.width,
            max_width: mode.width,
            min_height: mode.height,
            max_height: mode.height,
        })
    }

    pub fn enum_frame_interval(
        &self,
        index: u32,
        width: u32,
        height: u32,
    ) -> SensorResult<FrameInterval> {
        if index as usize >= MODES.len() || width > WIDTH_MAX || height > HEIGHT_MAX {
            return Err(SensorError::InvalidArgument(format!(
                "frame interval index {} for {}x{}",
                index, width, height
            )));
        }
        Ok(FrameInterval::default())
    }

    pub fn frame_interval(&self) -> FrameInterval {
        self.lock().frame_interval
    }

    /// フレーム間隔は固定。要求値に関係なく現在値を返す
    pub fn set_frame_interval(&self, _requested: FrameInterval) -> FrameInterval {
        self.lock().frame_interval
    }

    /// ストリームの開始/停止。既にその状態なら何もしない
    pub fn set_stream(&self, enable: bool) -> SensorResult<()> {
        let mut inner = self.lock();
        if enable {
            inner.stream_on()
        } else {
            inner.stream_off()
        }
    }

    /// ストリーミング中なら止めて、resume で再開できるよう記録する
    pub fn suspend(&self) {
        let mut inner = self.lock();
        if !inner.streaming {
            return;
        }

        inner.resume_streaming = true;
        if let Err(e) = inner.stream_off() {
            warn!("stream off on suspend: {}", e);
        }
        info!("suspended");
    }

    pub fn resume(&self) -> SensorResult<()> {
        let mut inner = self.lock();
        if !inner.resume_streaming {
            return Ok(());
        }
        inner.resume_streaming = false;

        if let Err(e) = inner.stream_on() {
            error!("stream on after resume failed: {}", e);
            if let Err(off_err) = stream_disable(&mut inner.regs) {
                warn!("stream disable after resume failure: {}", off_err);
            }
            inner.streaming = false;
            return Err(e);
        }
        info!("resumed");
        Ok(())
    }

    pub fn set_auto_gain(&self, auto: bool) -> SensorResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.controls.gain.set_auto(auto);
        if !inner.powered() {
            return Ok(());
        }
        inner.controls.program_gain(&mut inner.regs, auto)
    }

    /// 自動ゲイン中は値を保持するだけで書き込まない
    pub fn set_gain(&self, value: u16) -> SensorResult<()> {
        let value = check_gain(i64::from(value))?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.controls.gain.set_value(value);
        if !inner.powered() {
            return Ok(());
        }
        let auto = inner.controls.gain.is_auto();
        inner.controls.program_gain(&mut inner.regs, auto)
    }

    /// 電源オン中はハードウェアの現在値を返す
    pub fn gain(&self) -> SensorResult<u16> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.powered() {
            return Ok(inner.controls.gain.value());
        }
        let value = ControlSet::read_gain(&mut inner.regs)?;
        inner.controls.gain.observe(value);
        Ok(value)
    }

    pub fn set_auto_exposure(&self, auto: bool) -> SensorResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.controls.exposure.set_auto(auto);
        if !inner.powered() {
            return Ok(());
        }
        inner.controls.program_exposure(&mut inner.regs, auto)
    }

    pub fn set_exposure(&self, value: u32) -> SensorResult<()> {
        let value = check_exposure(i64::from(value))?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.controls.exposure.set_value(value);
        if !inner.powered() {
            return Ok(());
        }
        let auto = inner.controls.exposure.is_auto();
        inner.controls.program_exposure(&mut inner.regs, auto)
    }

    pub fn exposure(&self) -> SensorResult<u32> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.powered() {
            return Ok(inner.controls.exposure.value());
        }
        let value = ControlSet::read_exposure(&mut inner.regs)?;
        inner.controls.exposure.observe(value);
        Ok(value)
    }

    pub fn set_hflip(&self, enable: bool) -> SensorResult<()> {
        self.set_flip(Flip::Horizontal, enable)
    }

    pub fn set_vflip(&self, enable: bool) -> SensorResult<()> {
        self.set_flip(Flip::Vertical, enable)
    }

    /// 反転を変え、ピクセルコードをハードウェアから導き直す
    fn set_flip(&self, which: Flip, enable: bool) -> SensorResult<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.streaming {
            return Err(SensorError::Busy("flip while streaming"));
        }

        inner.controls.set_flip(which, enable);
        if !inner.powered() {
            inner.fmt.code = inner.controls.cached_bayer_order();
            return Ok(());
        }
        inner.fmt.code = ControlSet::program_flip(&mut inner.regs, which, enable)?;
        Ok(())
    }

    pub fn set_test_pattern(&self, index: u8) -> SensorResult<()> {
        let index = check_test_pattern(i64::from(index))?;
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.controls.test_pattern = index;
        if !inner.powered() {
            return Ok(());
        }
        ControlSet::program_test_pattern(&mut inner.regs, index)
    }

    /// 数値でコントロールを設定する（真偽値は 0 以外を真とする）
    pub fn set_control(&self, id: ControlId, value: i64) -> SensorResult<()> {
        match id {
            ControlId::AutoGain => self.set_auto_gain(value != 0),
            ControlId::Gain => self.set_gain(check_gain(value)?),
            ControlId::AutoExposure => self.set_auto_exposure(value != 0),
            ControlId::Exposure => self.set_exposure(check_exposure(value)?),
            ControlId::HFlip => self.set_hflip(value != 0),
            ControlId::VFlip => self.set_vflip(value != 0),
            ControlId::TestPattern => self.set_test_pattern(check_test_pattern(value)?),
        }
    }

    /// 数値でコントロールを読む。ゲインと露出は電源オン中ならハードウェアから読む
    pub fn control(&self, id: ControlId) -> SensorResult<i64> {
        let value = match id {
            ControlId::Gain => i64::from(self.gain()?),
            ControlId::Exposure => i64::from(self.exposure()?),
            ControlId::AutoGain => i64::from(self.lock().controls.gain.is_auto()),
            ControlId::AutoExposure => i64::from(self.lock().controls.exposure.is_auto()),
            ControlId::HFlip => i64::from(self.lock().controls.hflip),
            ControlId::VFlip => i64::from(self.lock().controls.vflip),
            ControlId::TestPattern => i64::from(self.lock().controls.test_pattern),
        };
        Ok(value)
    }
}
