//! Serial transport: a thin raw-REPL client over `serialport`.
//!
//! Only what the shells need is here: enter raw mode, send a program, read
//! its output and traceback, leave raw mode. File transfer runs small
//! programs that hexlify or unhexlify file contents.

use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, trace};

use super::{Connector, Device, Snippet, literal};
use crate::error::DeviceError;
use crate::paths::RemotePath;

const BAUD_RATE: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Longest silence tolerated while waiting for the hub.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

const CTRL_A: u8 = 0x01;
const CTRL_B: u8 = 0x02;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;

const RAW_REPL_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

/// Bytes written per chunk when sending code.
const WRITE_CHUNK: usize = 256;
/// File bytes per `write` call on the hub.
const PUT_CHUNK: usize = 64;
/// File bytes per `read` call on the hub.
const GET_CHUNK: usize = 32;

/// Lists and opens serial ports.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn ports(&self) -> Result<Vec<String>, DeviceError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }

    fn open(&self, port: &str) -> Result<Box<dyn Device>, DeviceError> {
        Ok(Box::new(SerialBoard::open(port)?))
    }
}

pub struct SerialBoard {
    port_name: String,
    port: Box<dyn SerialPort>,
}

impl SerialBoard {
    pub fn open(port_name: &str) -> Result<Self, DeviceError> {
        debug!("Opening serial port {} @ {} baud", port_name, BAUD_RATE);
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self {
            port_name: port_name.to_string(),
            port,
        })
    }

    fn enter_raw_repl(&mut self) -> Result<(), DeviceError> {
        trace!("entering raw REPL");
        self.port.write_all(&[b'\r', CTRL_C, CTRL_C])?;
        thread::sleep(Duration::from_millis(50));
        self.port.clear(serialport::ClearBuffer::Input)?;
        self.port.write_all(&[b'\r', CTRL_A])?;
        read_until(&mut *self.port, RAW_REPL_BANNER, IDLE_TIMEOUT)?;
        Ok(())
    }

    fn exit_raw_repl(&mut self) -> Result<(), DeviceError> {
        trace!("leaving raw REPL");
        self.port.write_all(&[b'\r', CTRL_B])?;
        Ok(())
    }

    /// Sends one program and returns its output; a traceback becomes an error.
    fn exec_raw(&mut self, code: &str) -> Result<Vec<u8>, DeviceError> {
        for chunk in code.as_bytes().chunks(WRITE_CHUNK) {
            self.port.write_all(chunk)?;
            thread::sleep(Duration::from_millis(10));
        }
        self.port.write_all(&[CTRL_D])?;

        let ack = read_count(&mut *self.port, 2, IDLE_TIMEOUT)?;
        if ack != b"OK" {
            return Err(DeviceError::Protocol(format!(
                "could not exec command: {:?}",
                String::from_utf8_lossy(&ack)
            )));
        }

        let mut output = read_until(&mut *self.port, &[CTRL_D], IDLE_TIMEOUT)?;
        output.pop();
        let mut error = read_until(&mut *self.port, &[CTRL_D], IDLE_TIMEOUT)?;
        error.pop();
        read_until(&mut *self.port, b">", IDLE_TIMEOUT)?;

        if !error.is_empty() {
            return Err(DeviceError::remote(String::from_utf8_lossy(&error)));
        }
        Ok(output)
    }

    /// Runs `f` inside raw mode; raw mode is left on every path, including a
    /// failed attempt to enter it.
    fn with_raw_repl<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let result = self.enter_raw_repl().and_then(|()| f(self));
        let exited = self.exit_raw_repl();
        let value = result?;
        exited?;
        Ok(value)
    }
}

/// Waits for the next byte. The port's short read timeout is retried until
/// `idle` passes without any data.
fn next_byte<R: Read + ?Sized>(reader: &mut R, idle: Duration) -> Result<u8, DeviceError> {
    let started = Instant::now();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(1) => return Ok(byte[0]),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
        if started.elapsed() > idle {
            return Err(DeviceError::Protocol(format!(
                "no data from device for {} ms",
                idle.as_millis()
            )));
        }
    }
}

/// Reads until `ending` shows up. Only silence longer than `idle` fails, so
/// long transfers are not cut off while data keeps arriving.
fn read_until<R: Read + ?Sized>(
    reader: &mut R,
    ending: &[u8],
    idle: Duration,
) -> Result<Vec<u8>, DeviceError> {
    let mut data = Vec::new();
    while !data.ends_with(ending) {
        data.push(next_byte(reader, idle)?);
    }
    Ok(data)
}

fn read_count<R: Read + ?Sized>(
    reader: &mut R,
    count: usize,
    idle: Duration,
) -> Result<Vec<u8>, DeviceError> {
    (0..count).map(|_| next_byte(reader, idle)).collect()
}

fn decode_hex(output: &[u8]) -> Result<Vec<u8>, DeviceError> {
    let text: Vec<u8> = output
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    hex::decode(text).map_err(|e| DeviceError::Protocol(format!("invalid hex payload: {e}")))
}

impl Device for SerialBoard {
    fn port(&self) -> &str {
        &self.port_name
    }

    fn exec(&mut self, snippet: &Snippet) -> Result<Vec<u8>, DeviceError> {
        let code = snippet.source();
        self.with_raw_repl(|board| board.exec_raw(&code))
    }

    fn get(&mut self, path: &RemotePath) -> Result<Vec<u8>, DeviceError> {
        let code = format!(
            "import sys\n\
             import ubinascii\n\
             with open({path}, 'rb') as infile:\n    \
                 while True:\n        \
                     result = infile.read({GET_CHUNK})\n        \
                     if result == b'':\n            \
                         break\n        \
                     sys.stdout.write(ubinascii.hexlify(result))\n",
            path = literal::quote(path.as_str()),
        );
        let output = self.with_raw_repl(|board| board.exec_raw(&code))?;
        decode_hex(&output)
    }

    fn put(&mut self, path: &RemotePath, data: &[u8]) -> Result<(), DeviceError> {
        let open = format!(
            "import ubinascii\nf = open({}, 'wb')\n",
            literal::quote(path.as_str())
        );
        self.with_raw_repl(|board| {
            board.exec_raw(&open)?;
            for chunk in data.chunks(PUT_CHUNK) {
                board.exec_raw(&format!(
                    "f.write(ubinascii.unhexlify('{}'))\n",
                    hex::encode(chunk)
                ))?;
            }
            board.exec_raw("f.close()\n")?;
            Ok(())
        })
    }

    fn rm(&mut self, path: &RemotePath) -> Result<(), DeviceError> {
        let code = format!("import os\nos.remove({})\n", literal::quote(path.as_str()));
        self.with_raw_repl(|board| board.exec_raw(&code)).map(drop)
    }

    fn mkdir(&mut self, path: &RemotePath, exists_okay: bool) -> Result<(), DeviceError> {
        let code = format!("import os\nos.mkdir({})\n", literal::quote(path.as_str()));
        match self.with_raw_repl(|board| board.exec_raw(&code)) {
            Ok(_) => Ok(()),
            Err(DeviceError::Remote { traceback })
                if exists_okay && traceback.contains("EEXIST") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn rmdir(&mut self, path: &RemotePath, missing_okay: bool) -> Result<(), DeviceError> {
        let code = format!("import os\nos.rmdir({})\n", literal::quote(path.as_str()));
        match self.with_raw_repl(|board| board.exec_raw(&code)) {
            Ok(_) => Ok(()),
            Err(e) if missing_okay && e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        debug!("Closing serial port {}", self.port_name);
        self.port.flush()?;
        Ok(())
    }
}
