//! TCP/IP over EMAC0 with `smoltcp`
//!
//! [`EthernetDevice`] adapts the ethernet driver to `smoltcp`'s device model,
//! [`NetStack`] owns a statically addressed IPv4 interface with one TCP socket,
//! and [`TcpConnection`] exposes that socket as a blocking byte stream for the
//! M2X client.

use core::fmt;

use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use smoltcp::iface::{Config, Interface, SocketHandle, SocketSet, SocketStorage};
use smoltcp::phy::{self, DeviceCapabilities, Medium};
use smoltcp::socket::tcp;
use smoltcp::time::Instant;
use smoltcp::wire::{EthernetAddress, HardwareAddress, IpAddress, IpCidr, Ipv4Address, Ipv4Cidr};
use tm4c1294_launchpad_core::m2x::Connection;
use tm4c1294_launchpad_core::timing::WideMillis;
use ufmt::derive::uDebug;

use crate::drivers::ethernet::descriptor::{BUFFER_SIZE, DESCRIPTORS};
use crate::drivers::ethernet::{EthernetDriver, EthernetError};
use crate::startup::clock;

/// Largest frame handed to the driver, header included
pub const MTU: usize = 1514;
/// Give up on a handshake after this long
pub const CONNECT_TIMEOUT_MS: u32 = 10_000;
/// Give up on a stalled send or receive after this long
pub const IO_TIMEOUT_MS: u32 = 5_000;
/// Wait this long for data before reporting a read as not ready
const READY_WAIT_MS: u32 = 20;
/// Time allowed for a FIN to go out on close
const CLOSE_WAIT_MS: u32 = 100;
/// First local port; later connections count up from here
const EPHEMERAL_PORT_START: u16 = 49152;

/// Network errors
#[derive(Clone, Copy, Debug, uDebug, PartialEq, Eq)]
pub enum NetError {
    /// The host could not be turned into an address
    Unreachable,
    /// The connection was refused or reset during the handshake
    ConnectFailed,
    /// No progress before the deadline
    Timeout,
    /// The socket is not connected
    NotConnected,
    /// The socket refused outgoing data
    Send,
    /// The socket failed to hand over received data
    Recv,
    /// Driver failure
    Ethernet(EthernetError),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl core::error::Error for NetError {}

impl embedded_io::Error for NetError {
    fn kind(&self) -> ErrorKind {
        match self {
            NetError::Unreachable => ErrorKind::AddrNotAvailable,
            NetError::ConnectFailed => ErrorKind::ConnectionRefused,
            NetError::Timeout => ErrorKind::TimedOut,
            NetError::NotConnected => ErrorKind::NotConnected,
            NetError::Send | NetError::Recv | NetError::Ethernet(_) => ErrorKind::Other,
        }
    }
}

impl From<EthernetError> for NetError {
    fn from(e: EthernetError) -> Self {
        NetError::Ethernet(e)
    }
}

/// The ethernet driver as a `smoltcp` device, with one bounce buffer per
/// direction
pub struct EthernetDevice {
    driver: EthernetDriver,
    rx_buf: [u8; BUFFER_SIZE],
    tx_buf: [u8; BUFFER_SIZE],
}

impl EthernetDevice {
    /// Wrap a started driver
    pub fn new(driver: EthernetDriver) -> Self {
        EthernetDevice {
            driver,
            rx_buf: [0; BUFFER_SIZE],
            tx_buf: [0; BUFFER_SIZE],
        }
    }

    /// The wrapped driver
    pub fn driver_mut(&mut self) -> &mut EthernetDriver {
        &mut self.driver
    }
}

/// A frame already copied out of the receive ring
pub struct EthernetRxToken<'a> {
    frame: &'a [u8],
}

/// Permission to send one frame
pub struct EthernetTxToken<'a> {
    driver: &'a mut EthernetDriver,
    buf: &'a mut [u8; BUFFER_SIZE],
}

impl phy::RxToken for EthernetRxToken<'_> {
    fn consume<R, F>(self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        f(self.frame)
    }
}

impl phy::TxToken for EthernetTxToken<'_> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let len = len.min(BUFFER_SIZE);
        let result = f(&mut self.buf[..len]);
        // A full ring drops the frame; TCP retransmits
        let _ = self.driver.transmit(&self.buf[..len]);
        result
    }
}

impl phy::Device for EthernetDevice {
    type RxToken<'a>
        = EthernetRxToken<'a>
    where
        Self: 'a;
    type TxToken<'a>
        = EthernetTxToken<'a>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        // Bad frames are skipped, at most one ring's worth per call
        for _ in 0..DESCRIPTORS {
            match self.driver.receive(&mut self.rx_buf) {
                Ok(len) => {
                    let rx = EthernetRxToken {
                        frame: &self.rx_buf[..len],
                    };
                    let tx = EthernetTxToken {
                        driver: &mut self.driver,
                        buf: &mut self.tx_buf,
                    };
                    return Some((rx, tx));
                }
                Err(EthernetError::NothingToReceive) => return None,
                Err(_) => continue,
            }
        }
        None
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.driver.tx_available() {
            return None;
        }
        Some(EthernetTxToken {
            driver: &mut self.driver,
            buf: &mut self.tx_buf,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = MTU;
        caps.max_burst_size = Some(DESCRIPTORS);
        caps
    }
}

/// Static IPv4 settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetConfig {
    /// Our address
    pub address: Ipv4Address,
    /// Subnet prefix length
    pub prefix_len: u8,
    /// Default route, if any
    pub gateway: Option<Ipv4Address>,
    /// Where connections go when the host is not a dotted IPv4 address
    pub fallback_server: Ipv4Address,
}

/// Backing memory for the TCP socket and the socket set
pub struct NetBuffers<'a> {
    storage: [SocketStorage<'a>; 1],
    rx: [u8; BUFFER_SIZE],
    tx: [u8; BUFFER_SIZE],
}

impl NetBuffers<'_> {
    /// Zeroed buffers
    pub const fn new() -> Self {
        NetBuffers {
            storage: [SocketStorage::EMPTY; 1],
            rx: [0; BUFFER_SIZE],
            tx: [0; BUFFER_SIZE],
        }
    }
}

impl Default for NetBuffers<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// One interface with one TCP socket
pub struct NetStack<'a> {
    device: EthernetDevice,
    iface: Interface,
    sockets: SocketSet<'a>,
    tcp: SocketHandle,
    fallback: Ipv4Address,
    next_port: u16,
    millis: WideMillis,
}

fn now(wide: &mut WideMillis) -> Instant {
    Instant::from_millis(wide.extend(clock::now_ms()) as i64)
}

impl<'a> NetStack<'a> {
    /// Bring up the interface with `config`. Needs [`clock::start`] to have run.
    pub fn new(driver: EthernetDriver, config: NetConfig, buffers: &'a mut NetBuffers<'a>) -> Self {
        let mac = driver.mac_address();
        let mut device = EthernetDevice::new(driver);

        let mut iface_config = Config::new(HardwareAddress::Ethernet(EthernetAddress(mac)));
        iface_config.random_seed = mac
            .iter()
            .fold(clock::now_ms() as u64, |seed, b| seed.rotate_left(8) ^ *b as u64);
        let mut millis = WideMillis::new();
        let mut iface = Interface::new(iface_config, &mut device, now(&mut millis));
        iface.update_ip_addrs(|addrs| {
            let cidr = IpCidr::Ipv4(Ipv4Cidr::new(config.address, config.prefix_len));
            let _ = addrs.push(cidr);
        });
        if let Some(gateway) = config.gateway {
            let _ = iface.routes_mut().add_default_ipv4_route(gateway);
        }

        let NetBuffers { storage, rx, tx } = buffers;
        let mut sockets = SocketSet::new(&mut storage[..]);
        let socket = tcp::Socket::new(
            tcp::SocketBuffer::new(&mut rx[..]),
            tcp::SocketBuffer::new(&mut tx[..]),
        );
        let tcp = sockets.add(socket);

        NetStack {
            device,
            iface,
            sockets,
            tcp,
            fallback: config.fallback_server,
            next_port: EPHEMERAL_PORT_START,
            millis,
        }
    }

    /// Move frames between the driver and the sockets
    pub fn poll(&mut self) {
        let at = now(&mut self.millis);
        self.iface.poll(at, &mut self.device, &mut self.sockets);
    }

    /// Keep polling for `ms` milliseconds
    pub fn poll_for(&mut self, ms: u32) {
        let start = clock::now_ms();
        while clock::now_ms().wrapping_sub(start) < ms {
            self.poll();
        }
    }

    /// The wrapped driver
    pub fn driver_mut(&mut self) -> &mut EthernetDriver {
        self.device.driver_mut()
    }

    /// The TCP socket as a [`Connection`]
    pub fn connection(&mut self) -> TcpConnection<'_, 'a> {
        TcpConnection { stack: self }
    }

    fn socket(&mut self) -> &mut tcp::Socket<'a> {
        self.sockets.get_mut::<tcp::Socket>(self.tcp)
    }

    fn resolve(&self, host: &str) -> Ipv4Address {
        host.parse::<Ipv4Address>().unwrap_or(self.fallback)
    }

    fn local_port(&mut self) -> u16 {
        let port = self.next_port;
        self.next_port = port.checked_add(1).unwrap_or(EPHEMERAL_PORT_START);
        port
    }

    /// Poll until `done` says stop, or fail with `Timeout` after `ms`
    fn poll_until<T>(
        &mut self,
        ms: u32,
        mut done: impl FnMut(&mut tcp::Socket<'a>) -> Option<Result<T, NetError>>,
    ) -> Result<T, NetError> {
        let start = clock::now_ms();
        loop {
            self.poll();
            if let Some(result) = done(self.socket()) {
                return result;
            }
            if clock::now_ms().wrapping_sub(start) >= ms {
                return Err(NetError::Timeout);
            }
        }
    }
}

/// Blocking byte stream over the stack's TCP socket
pub struct TcpConnection<'s, 'a> {
    stack: &'s mut NetStack<'a>,
}

impl ErrorType for TcpConnection<'_, '_> {
    type Error = NetError;
}

impl Read for TcpConnection<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.stack.poll_until(IO_TIMEOUT_MS, |s| {
            if s.can_recv() {
                Some(s.recv_slice(buf).map_err(|_| NetError::Recv))
            } else if !s.may_recv() {
                // Peer closed and everything has been read
                Some(Ok(0))
            } else {
                None
            }
        })
    }
}

impl ReadReady for TcpConnection<'_, '_> {
    fn read_ready(&mut self) -> Result<bool, NetError> {
        let ready = self
            .stack
            .poll_until(READY_WAIT_MS, |s| s.can_recv().then_some(Ok(true)));
        match ready {
            Err(NetError::Timeout) => Ok(false),
            other => other,
        }
    }
}

impl Write for TcpConnection<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let sent = self.stack.poll_until(IO_TIMEOUT_MS, |s| {
            if !s.may_send() {
                Some(Err(NetError::NotConnected))
            } else if s.can_send() {
                Some(s.send_slice(buf).map_err(|_| NetError::Send))
            } else {
                None
            }
        })?;
        self.stack.poll();
        Ok(sent)
    }

    fn flush(&mut self) -> Result<(), NetError> {
        self.stack.poll_until(IO_TIMEOUT_MS, |s| {
            if s.send_queue() == 0 {
                Some(Ok(()))
            } else if !s.may_send() {
                Some(Err(NetError::NotConnected))
            } else {
                None
            }
        })
    }
}

impl Connection for TcpConnection<'_, '_> {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), NetError> {
        let remote = self.stack.resolve(host);
        if remote.is_unspecified() {
            return Err(NetError::Unreachable);
        }
        let local = self.stack.local_port();

        let stack = &mut *self.stack;
        let socket = stack.sockets.get_mut::<tcp::Socket>(stack.tcp);
        if socket.is_open() {
            socket.abort();
        }
        socket
            .connect(stack.iface.context(), (IpAddress::Ipv4(remote), port), local)
            .map_err(|_| NetError::Unreachable)?;

        let result = stack.poll_until(CONNECT_TIMEOUT_MS, |s| match s.state() {
            tcp::State::Established => Some(Ok(())),
            tcp::State::Closed | tcp::State::TimeWait => Some(Err(NetError::ConnectFailed)),
            _ => None,
        });
        if result.is_err() {
            stack.socket().abort();
            stack.poll();
        }
        result
    }

    fn connected(&mut self) -> bool {
        self.stack.poll();
        let s = self.stack.socket();
        s.can_recv() || s.may_recv()
    }

    fn stop(&mut self) {
        self.stack.socket().close();
        self.stack.poll_for(CLOSE_WAIT_MS);
        let s = self.stack.socket();
        if s.is_open() && !matches!(s.state(), tcp::State::TimeWait) {
            s.abort();
        }
        self.stack.poll();
    }
}
