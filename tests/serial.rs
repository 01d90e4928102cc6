use dotboy_core::bus::BusDevice;
use dotboy_core::interrupts::{Interrupt, InterruptController};
use dotboy_core::serial::{SB_ADDR, SC_ADDR, Serial};

#[test]
fn internal_transfer_shifts_ones_in() {
    let mut serial = Serial::new();
    let mut ic = InterruptController::new();

    serial.write(SB_ADDR, 0x12);
    serial.write(SC_ADDR, 0x81); // start, internal clock

    serial.tick(512 * 8, &mut ic);

    // No partner on the line: the incoming byte is all ones.
    assert_eq!(serial.read(SB_ADDR), 0xFF);
    assert_eq!(serial.read(SC_ADDR), 0x7F); // start bit dropped
    assert_ne!(ic.if_reg & Interrupt::Serial.mask(), 0);
    assert_eq!(serial.take_output(), vec![0x12]);
}

#[test]
fn bits_shift_on_512_cycle_boundaries() {
    let mut serial = Serial::new();
    let mut ic = InterruptController::new();

    serial.write(SB_ADDR, 0x12);
    serial.write(SC_ADDR, 0x81);

    serial.tick(511, &mut ic);
    assert_eq!(serial.read(SB_ADDR), 0x12);

    serial.tick(1, &mut ic);
    assert_eq!(serial.read(SB_ADDR), 0x25); // one bit in

    serial.tick(512 * 7, &mut ic);
    assert_eq!(serial.read(SB_ADDR), 0xFF);
    assert_ne!(ic.if_reg & Interrupt::Serial.mask(), 0);
}

#[test]
fn external_clock_stalls_without_a_partner() {
    let mut serial = Serial::new();
    let mut ic = InterruptController::new();

    serial.write(SB_ADDR, 0x12);
    serial.write(SC_ADDR, 0x80); // start, external clock

    serial.tick(1_000_000, &mut ic);

    assert_eq!(serial.read(SB_ADDR), 0x12);
    assert_eq!(serial.read(SC_ADDR), 0xFE); // still pending
    assert_eq!(ic.if_reg, 0);
    assert!(serial.take_output().is_empty());
}

#[test]
fn clearing_the_start_bit_cancels_the_transfer() {
    let mut serial = Serial::new();
    let mut ic = InterruptController::new();

    serial.write(SB_ADDR, 0x12);
    serial.write(SC_ADDR, 0x81);
    serial.write(SC_ADDR, 0x01);

    serial.tick(8192, &mut ic);

    assert_eq!(serial.read(SB_ADDR), 0x12);
    assert_eq!(ic.if_reg, 0);
    assert!(serial.peek_output().is_empty());
}

#[test]
fn output_buffer_collects_sequential_transfers() {
    let mut serial = Serial::new();
    let mut ic = InterruptController::new();

    for byte in [0x41, 0x42] {
        serial.write(SB_ADDR, byte);
        serial.write(SC_ADDR, 0x81);
        serial.tick(512 * 8, &mut ic);
    }

    assert_eq!(serial.peek_output(), &[0x41, 0x42]);
    assert_eq!(serial.take_output(), vec![0x41, 0x42]);
    assert!(serial.peek_output().is_empty());
}
