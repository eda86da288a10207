//! Digital-to-analog converter
//!
//! A [`Converter`] owns one or two output lines and streams 8-bit samples
//! to them at a fixed sample rate through a [`DacDriver`]. Two samples per
//! frame are interleaved when two lines are configured.

use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::buffer::BufferView;
use crate::config::ConverterConfig;
use crate::constants::DEFAULT_SAMPLE_RATE;
use crate::drivers::line::{LineClaim, LineId, OutputLines};
use crate::drivers::sim::SimulatedDac;
use crate::error::ConverterError;

/// Hardware seam for a converter backend
pub trait DacDriver: Send {
    /// Configure the backend for `lines` at `sample_rate` Hz
    fn init(&mut self, lines: &[LineId], sample_rate: u32) -> io::Result<()>;

    /// Begin emitting `samples` without waiting for completion
    fn start(&mut self, samples: Bytes) -> io::Result<()>;

    /// Block until the most recently started conversion finishes
    fn wait(&mut self) -> io::Result<()>;

    /// Emit `samples` and block until done
    fn convert(&mut self, samples: &[u8]) -> io::Result<()> {
        self.start(Bytes::copy_from_slice(samples))?;
        self.wait()
    }
}

/// Whether a started conversion is still outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Converting,
}

/// DAC output bound to one or two lines
pub struct Converter {
    id: Uuid,
    // Declared before `lines` so the driver stops before the lines are released.
    driver: Mutex<Box<dyn DacDriver>>,
    converting: AtomicBool,
    lines: LineClaim,
    sample_rate: u32,
}

impl Converter {
    /// Converter at the default sample rate
    pub fn new(lines: impl Into<OutputLines>) -> Result<Self, ConverterError> {
        Self::with_sample_rate(lines, DEFAULT_SAMPLE_RATE)
    }

    /// Converter at an explicit sample rate
    pub fn with_sample_rate(
        lines: impl Into<OutputLines>,
        sample_rate: u32,
    ) -> Result<Self, ConverterError> {
        Self::with_driver(lines, sample_rate, Box::new(SimulatedDac::new()))
    }

    /// Converter backed by a specific driver
    pub fn with_driver(
        lines: impl Into<OutputLines>,
        sample_rate: u32,
        mut driver: Box<dyn DacDriver>,
    ) -> Result<Self, ConverterError> {
        if sample_rate == 0 {
            return Err(ConverterError::InvalidSampleRate(sample_rate));
        }

        let id = Uuid::new_v4();
        let lines = LineClaim::acquire(id, &lines.into())?;

        driver
            .init(lines.lines(), sample_rate)
            .map_err(|e| ConverterError::InitFailed(e.to_string()))?;

        tracing::info!(
            "Converter {} ready on lines {:?} at {} Hz",
            id,
            lines.lines(),
            sample_rate
        );

        Ok(Self {
            id,
            driver: Mutex::new(driver),
            converting: AtomicBool::new(false),
            lines,
            sample_rate,
        })
    }

    /// Create a converter from configuration
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConverterError> {
        Self::with_sample_rate(config.lines.clone(), config.sample_rate)
    }

    /// Emit `samples` and block until every frame has been output
    pub fn convert<'a>(&self, samples: impl Into<BufferView<'a>>) -> Result<(), ConverterError> {
        let samples = samples.into();
        let mut driver = self.driver.lock();
        self.finish_outstanding(&mut **driver)
            .map_err(|e| ConverterError::ConversionFailed(e.to_string()))?;

        driver.convert(samples.as_slice()).map_err(|e| {
            tracing::warn!("Converter {} conversion failed: {}", self.id, e);
            ConverterError::ConversionFailed(e.to_string())
        })
    }

    /// Start emitting `samples` and return immediately.
    ///
    /// A conversion that is still outstanding is waited for first.
    pub fn async_convert(&self, samples: impl Into<Bytes>) -> Result<(), ConverterError> {
        let mut driver = self.driver.lock();
        self.finish_outstanding(&mut **driver)
            .map_err(|e| ConverterError::ConversionFailed(e.to_string()))?;

        driver
            .start(samples.into())
            .map_err(|e| ConverterError::ConversionFailed(e.to_string()))?;
        self.converting.store(true, Ordering::Release);
        Ok(())
    }

    /// Block until the outstanding asynchronous conversion completes.
    ///
    /// Returns immediately when nothing is outstanding.
    pub fn async_wait(&self) -> Result<(), ConverterError> {
        let mut driver = self.driver.lock();
        self.finish_outstanding(&mut **driver).map_err(|e| {
            tracing::warn!("Converter {} wait failed: {}", self.id, e);
            ConverterError::WaitFailed(e.to_string())
        })
    }

    /// Get current conversion state
    pub fn state(&self) -> ConversionState {
        if self.is_converting() {
            ConversionState::Converting
        } else {
            ConversionState::Idle
        }
    }

    /// Check if an asynchronous conversion is outstanding
    pub fn is_converting(&self) -> bool {
        self.converting.load(Ordering::Acquire)
    }

    /// Get the owned output lines
    pub fn lines(&self) -> &[LineId] {
        self.lines.lines()
    }

    /// Get sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the converter's owner id
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn finish_outstanding(&self, driver: &mut dyn DacDriver) -> io::Result<()> {
        if !self.converting.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        driver.wait()
    }
}

impl Drop for Converter {
    fn drop(&mut self) {
        let driver = self.driver.get_mut();
        if self.converting.swap(false, Ordering::AcqRel) {
            if let Err(e) = driver.wait() {
                tracing::warn!("Converter {} dropped mid-conversion: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("id", &self.id)
            .field("lines", &self.lines())
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::line::is_claimed;
    use std::time::{Duration, Instant};

    // Line numbers are unique per test: ownership is process-wide.

    fn unpaced(lines: impl Into<OutputLines>) -> (Converter, std::sync::Arc<crate::drivers::SimulatedOutput>) {
        let dac = SimulatedDac::unpaced();
        let output = dac.output();
        let converter = Converter::with_driver(lines, 100, Box::new(dac)).unwrap();
        (converter, output)
    }

    #[test]
    fn test_async_convert_then_wait() {
        let converter = Converter::with_sample_rate(2001u32, 100).unwrap();
        assert_eq!(converter.state(), ConversionState::Idle);

        let started = Instant::now();
        converter.async_convert(vec![0u8, 64, 128, 192, 255]).unwrap();
        assert!(converter.is_converting());

        converter.async_wait().unwrap();
        assert_eq!(converter.state(), ConversionState::Idle);
        assert!(started.elapsed() >= Duration::from_millis(45));

        // Nothing outstanding
        converter.async_wait().unwrap();
    }

    #[test]
    fn test_blocking_convert() {
        let (converter, output) = unpaced(2002u32);
        converter.convert(&[1u8, 2, 3][..]).unwrap();
        assert_eq!(output.samples(0), vec![1, 2, 3]);
        assert!(!converter.is_converting());
    }

    #[test]
    fn test_line_in_use_between_converters() {
        let (_first, _) = unpaced(2003u32);
        let err = Converter::new(2003u32).unwrap_err();
        assert!(matches!(err, ConverterError::LineInUse(2003)));
    }

    #[test]
    fn test_lines_released_on_drop() {
        let (converter, _) = unpaced([2004u32, 2005]);
        assert_eq!(converter.lines(), &[2004, 2005]);
        drop(converter);
        assert!(!is_claimed(2004));
        assert!(!is_claimed(2005));
    }

    #[test]
    fn test_two_lines_interleave() {
        let (converter, output) = unpaced([2006u32, 2007]);
        converter.async_convert(Bytes::from_static(&[10, 20, 11, 21])).unwrap();
        converter.async_wait().unwrap();
        assert_eq!(output.samples(0), vec![10, 11]);
        assert_eq!(output.samples(1), vec![20, 21]);
    }

    #[test]
    fn test_async_convert_waits_for_previous() {
        let (converter, output) = unpaced(2008u32);
        converter.async_convert(vec![1u8]).unwrap();
        converter.async_convert(vec![2u8]).unwrap();
        converter.async_wait().unwrap();
        assert_eq!(output.samples(0), vec![1, 2]);
        assert_eq!(output.conversions(), 2);
    }

    #[test]
    fn test_failures_are_reported() {
        let (converter, output) = unpaced(2009u32);

        output.inject_failure();
        let err = converter.convert(&[1u8][..]).unwrap_err();
        assert!(matches!(err, ConverterError::ConversionFailed(_)));

        output.inject_failure();
        converter.async_convert(vec![1u8]).unwrap();
        let err = converter.async_wait().unwrap_err();
        assert!(matches!(err, ConverterError::WaitFailed(_)));
        assert_eq!(converter.state(), ConversionState::Idle);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            Converter::with_sample_rate(2010u32, 0),
            Err(ConverterError::InvalidSampleRate(0))
        ));
        assert!(!is_claimed(2010));
        assert!(matches!(
            Converter::new(vec![2011u32, 2012, 2013]),
            Err(ConverterError::TooManyLines(3))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = ConverterConfig {
            sample_rate: 8000,
            lines: vec![2014],
        };
        let converter = Converter::from_config(&config).unwrap();
        assert_eq!(converter.sample_rate(), 8000);
        assert_eq!(converter.lines(), &[2014]);
    }
}
