//! Post the on-chip temperature to an M2X stream every ten seconds
//!
//! The API key, feed id and server come from the build environment:
//!
//! ```text
//! M2X_API_KEY=... M2X_FEED_ID=... M2X_HOST_ADDR=192.168.0.10 \
//!     cargo build --release --example m2x_telemetry
//! ```
//!
//! `M2X_HOST_ADDR` may be a dotted address, such as a machine running
//! `m2x_sink`, or a name; names go to `M2X_SERVER_ADDR`, since there is no
//! DNS. The board itself uses a static address.

#![no_std]
#![no_main]

extern crate tm4c1294_launchpad;

use smoltcp::wire::Ipv4Address;
use tm4c1294_launchpad::board::{safe, Board};
use tm4c1294_launchpad::console;
use tm4c1294_launchpad::drivers::adc::Adc;
use tm4c1294_launchpad::drivers::ethernet::{EthernetConfig, EthernetDriver};
use tm4c1294_launchpad::net::{NetBuffers, NetConfig, NetStack};
use tm4c1294_launchpad::startup::clock;
use tm4c1294_launchpad_core::adc::{
    AdcClock, Input, Oversample, SampleHold, SequenceProgram, Sequencer, Trigger,
};
use tm4c1294_launchpad_core::m2x::{ClientConfig, M2xClient, DEFAULT_HOST};
use tm4c1294_launchpad_core::temperature::Temperature;
use ufmt::uwriteln;

const API_KEY: &str = match option_env!("M2X_API_KEY") {
    Some(key) => key,
    None => "",
};
const FEED_ID: &str = match option_env!("M2X_FEED_ID") {
    Some(feed) => feed,
    None => "",
};
const HOST: &str = match option_env!("M2X_HOST_ADDR") {
    Some(host) => host,
    None => DEFAULT_HOST,
};
const STREAM: &str = "temperature";

const ADDRESS: Ipv4Address = Ipv4Address::new(192, 168, 0, 50);
const PREFIX_LEN: u8 = 24;
const GATEWAY: Ipv4Address = Ipv4Address::new(192, 168, 0, 1);
const DEFAULT_SERVER: Ipv4Address = Ipv4Address::new(192, 168, 0, 10);

const SEQUENCER: Sequencer = Sequencer::Ss1;
const SAMPLES: usize = 4;
const SEND_INTERVAL_MS: u32 = 10_000;
/// Let the PHY negotiate before the first request
const LINK_WAIT_MS: u32 = 3_000;

#[no_mangle]
pub fn stellaris_main(mut board: Board) -> ! {
    let mut console = console::uart0(board.UART0, board.GPIO_PORTA_AHB, &board.power_control);
    let delay = clock::start(&mut board.core_peripherals.SYST);
    let pc = &board.power_control;

    let adc = Adc::new(board.ADC0, pc, Oversample::None, AdcClock::PllVco { divisor: 15 });
    let program = match SequenceProgram::build(
        SEQUENCER,
        &[Input::Temperature; SAMPLES],
        SampleHold::_256,
    ) {
        Ok(p) => p,
        Err(e) => {
            uwriteln!(console, "Sequence rejected: {:?}", e).unwrap_or_default();
            safe();
        }
    };
    adc.configure(Trigger::Processor, &program);
    adc.enable(SEQUENCER);

    let driver = match EthernetDriver::new(
        board.EMAC0,
        &board.FLASH_CTRL,
        pc,
        EthernetConfig::default(),
    ) {
        Ok(d) => d,
        Err(e) => {
            uwriteln!(console, "Ethernet failed: {:?}", e).unwrap_or_default();
            safe();
        }
    };
    let mac = driver.mac_address();
    uwriteln!(
        console,
        "MAC {:?}  IP {}.{}.{}.{}",
        &mac[..],
        ADDRESS.octets()[0],
        ADDRESS.octets()[1],
        ADDRESS.octets()[2],
        ADDRESS.octets()[3]
    )
    .unwrap_or_default();

    let fallback_server = option_env!("M2X_SERVER_ADDR")
        .and_then(|s| s.parse::<Ipv4Address>().ok())
        .unwrap_or(DEFAULT_SERVER);
    let config = NetConfig {
        address: ADDRESS,
        prefix_len: PREFIX_LEN,
        gateway: Some(GATEWAY),
        fallback_server,
    };
    let mut buffers = NetBuffers::new();
    let mut stack = NetStack::new(driver, config, &mut buffers);

    stack.poll_for(LINK_WAIT_MS);
    let link = stack.driver_mut().link_status();
    uwriteln!(console, "Link {:?}", link).unwrap_or_default();

    if API_KEY.is_empty() || FEED_ID.is_empty() {
        uwriteln!(console, "M2X_API_KEY and M2X_FEED_ID are not set").unwrap_or_default();
    }

    let client_config = ClientConfig {
        host: HOST,
        ..ClientConfig::default()
    };
    loop {
        let mut raw = [0_u16; SAMPLES];
        let n = adc.sample_blocking(SEQUENCER, &mut raw);
        let samples = raw.map(|s| s as u32);

        match Temperature::from_samples(&samples[..n]) {
            Some(t) => {
                let mut client = M2xClient::new(stack.connection(), delay, API_KEY, client_config);
                match client.send(FEED_ID, STREAM, &t.celsius) {
                    Ok(status) => {
                        uwriteln!(console, "{} C -> {}", t.celsius, status).unwrap_or_default()
                    }
                    Err(e) => uwriteln!(console, "{} C -> {:?}", t.celsius, e).unwrap_or_default(),
                }
            }
            None => uwriteln!(console, "No samples").unwrap_or_default(),
        }

        stack.poll_for(SEND_INTERVAL_MS);
    }
}
