// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::{
    mixer::{ActiveSource, AudioMixer, BufferSource},
    AudioError, DeviceState, OscillatorVoice,
};
use crate::{config, samples::LoadedSample};

/// Summary of an output device, for listing.
pub struct DeviceInfo {
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub host_id: cpal::HostId,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) (Rate={}) ({})",
            self.name,
            self.channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

/// Requests handled by the output thread, which owns the stream.
enum Control {
    Resume(crossbeam_channel::Sender<Result<(), AudioError>>),
    Close,
}

/// An output device backed by cpal. The stream lives on its own thread and
/// starts paused until [`super::Device::resume`] is called.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The number of output channels.
    channels: u16,
    /// The output sample rate.
    sample_rate: u32,
    host_id: cpal::HostId,
    state: Arc<Mutex<DeviceState>>,
    /// Channel for sending new audio sources to the output callback.
    source_tx: crossbeam_channel::Sender<ActiveSource>,
    control_tx: crossbeam_channel::Sender<Control>,
    /// Handle to the output thread (keeps it alive).
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) (Rate={}) ({})",
            self.name,
            self.channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists output devices across all available hosts.
    pub fn list() -> Result<Vec<DeviceInfo>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for (host_id, device) in Device::output_devices()? {
            let output_config = match device.default_output_config() {
                Ok(output_config) => output_config,
                Err(_) => continue,
            };
            devices.push(DeviceInfo {
                name: device.description()?.name().to_string(),
                channels: output_config.channels(),
                sample_rate: output_config.sample_rate(),
                host_id,
            });
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    fn output_devices() -> Result<Vec<(cpal::HostId, cpal::Device)>, AudioError> {
        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };
            devices.extend(host_devices.map(|device| (host_id, device)));
        }
        Ok(devices)
    }

    /// Finds the configured device. "default" picks the default output of the
    /// default host.
    fn find(name: &str) -> Result<(cpal::HostId, cpal::Device), AudioError> {
        if name == config::DEFAULT_AUDIO_DEVICE {
            let host = cpal::default_host();
            return host
                .default_output_device()
                .map(|device| (host.id(), device))
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()));
        }

        let _shh_stderr = shh::stderr()?;
        for (host_id, device) in Device::output_devices()? {
            if device.description()?.name().trim() == name {
                return Ok((host_id, device));
            }
        }
        Err(AudioError::DeviceNotFound(name.to_string()))
    }

    /// Opens the configured device. The output stream is built immediately
    /// but stays suspended.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let (host_id, device) = Device::find(name)?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: config.sample_rate().unwrap_or(supported.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = stream_config.channels;
        let sample_rate = stream_config.sample_rate;
        let state = Arc::new(Mutex::new(DeviceState::Suspended));
        let (source_tx, source_rx) = crossbeam_channel::unbounded::<ActiveSource>();
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<Control>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);

        // cpal streams can't move between threads, so the stream is created and
        // driven entirely on the output thread.
        let output_thread = {
            let state = state.clone();
            let name = name.to_string();
            thread::spawn(move || {
                let mixer = AudioMixer::new(stream_config.channels, stream_config.sample_rate);
                let stream =
                    match build_stream(&device, &stream_config, sample_format, mixer, source_rx) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                // Some backends start streams as soon as they are built.
                if let Err(e) = stream.pause() {
                    debug!(err = e.to_string(), "Unable to pause new output stream");
                }
                let _ = ready_tx.send(Ok(()));

                for control in control_rx.iter() {
                    match control {
                        Control::Resume(reply_tx) => {
                            let result = stream.play().map_err(AudioError::from);
                            if result.is_ok() {
                                *state.lock() = DeviceState::Running;
                                info!(device = name, "Output stream running");
                            }
                            let _ = reply_tx.send(result);
                        }
                        Control::Close => break,
                    }
                }

                *state.lock() = DeviceState::Closed;
                drop(stream);
                info!(device = name, "Output stream closed");
            })
        };

        ready_rx.recv().map_err(|_| AudioError::OutputThread)??;

        Ok(Device {
            name: name.to_string(),
            channels,
            sample_rate,
            host_id,
            state,
            source_tx,
            control_tx,
            output_thread: Mutex::new(Some(output_thread)),
        })
    }

    fn start(&self, source: ActiveSource) -> Result<(), AudioError> {
        if self.state() == DeviceState::Closed {
            return Err(AudioError::Closed);
        }
        self.source_tx.send(source).map_err(|_| AudioError::Closed)
    }

    fn state(&self) -> DeviceState {
        *self.state.lock()
    }
}

/// Builds an output stream that mixes everything received on `source_rx`.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: AudioMixer,
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
) -> Result<cpal::Stream, AudioError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, mixer, source_rx),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, mixer, source_rx),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(device, config, mixer, source_rx),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, mixer, source_rx),
        other => Err(AudioError::UnsupportedFormat(other.to_string())),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: AudioMixer,
    source_rx: crossbeam_channel::Receiver<ActiveSource>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(source) = source_rx.try_recv() {
                mixer.add_source(source);
            }
            scratch.resize(data.len(), 0.0);
            mixer.process_into(&mut scratch);
            for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(*sample);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

impl super::Device for Device {
    fn state(&self) -> DeviceState {
        Device::state(self)
    }

    fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            DeviceState::Running => return Ok(()),
            DeviceState::Closed => return Err(AudioError::Closed),
            DeviceState::Suspended => {}
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.control_tx
            .send(Control::Resume(reply_tx))
            .map_err(|_| AudioError::OutputThread)?;
        reply_rx.recv().map_err(|_| AudioError::OutputThread)?
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play_sample(
        &self,
        label: &str,
        sample: &LoadedSample,
        volume: f32,
    ) -> Result<(), AudioError> {
        self.start(ActiveSource::new(
            label,
            Box::new(BufferSource::new(
                sample.samples(),
                sample.channel_count(),
                volume,
            )),
        ))
    }

    fn play_voice(&self, voice: OscillatorVoice) -> Result<(), AudioError> {
        let label = format!("{:.2}Hz", voice.frequency);
        self.start(ActiveSource::new(
            &label,
            Box::new(voice.into_source(self.sample_rate)),
        ))
    }

    fn close(&self) {
        let _ = self.control_tx.send(Control::Close);
        if let Some(output_thread) = self.output_thread.lock().take() {
            if output_thread.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
        *self.state.lock() = DeviceState::Closed;
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, AudioError> {
        Err(AudioError::DeviceNotFound(format!("{} is not a mock", self.name)))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let _ = self.control_tx.send(Control::Close);
    }
}
