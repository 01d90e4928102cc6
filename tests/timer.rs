use dotboy_core::bus::Bus;
use dotboy_core::timer::{DIV_ADDR, TAC_ADDR, TIMA_ADDR, TMA_ADDR};

const IF_ADDR: u16 = 0xFF0F;

#[test]
fn div_advances_every_256_cycles() {
    let mut bus = Bus::new();
    bus.tick(255);
    assert_eq!(bus.read(DIV_ADDR), 0);
    bus.tick(1);
    assert_eq!(bus.read(DIV_ADDR), 1);
    bus.tick(256 * 4);
    assert_eq!(bus.read(DIV_ADDR), 5);
}

#[test]
fn div_write_resets_the_prescaler() {
    let mut bus = Bus::new();
    bus.tick(200);
    bus.write(DIV_ADDR, 0xAB); // value is ignored
    assert_eq!(bus.read(DIV_ADDR), 0);

    // The sub-256 progress made before the write is gone too.
    bus.tick(255);
    assert_eq!(bus.read(DIV_ADDR), 0);
    bus.tick(1);
    assert_eq!(bus.read(DIV_ADDR), 1);
}

#[test]
fn tima_counts_only_while_enabled() {
    let mut bus = Bus::new();
    bus.tick(4096);
    assert_eq!(bus.read(TIMA_ADDR), 0);
    assert_eq!(bus.read(DIV_ADDR), 16);

    bus.write(TAC_ADDR, 0x05); // enable, one tick per 16 cycles
    bus.tick(160);
    assert_eq!(bus.read(TIMA_ADDR), 10);

    bus.write(TAC_ADDR, 0x01); // same rate, disabled
    bus.tick(160);
    assert_eq!(bus.read(TIMA_ADDR), 10);
}

#[test]
fn overflow_reloads_tma_and_requests_the_interrupt() {
    let mut bus = Bus::new();
    bus.write(TMA_ADDR, 0xAB);
    bus.write(TIMA_ADDR, 0xFE);
    bus.write(TAC_ADDR, 0x05);

    bus.tick(32); // 0xFE -> 0xFF -> overflow
    assert_eq!(bus.read(TIMA_ADDR), 0xAB);
    assert_ne!(bus.read(IF_ADDR) & 0x04, 0);

    // Counting resumes from the reloaded value.
    bus.tick(16);
    assert_eq!(bus.read(TIMA_ADDR), 0xAC);
}

#[test]
fn rate_change_reapplies_the_accumulated_count() {
    let mut bus = Bus::new();
    bus.write(TAC_ADDR, 0x04); // enable at the slowest rate (1024)
    bus.tick(1008);
    assert_eq!(bus.read(TIMA_ADDR), 0);

    // Switching to the 16-cycle rate re-checks the sub-counter at once:
    // 1008 / 16 increments land without any further ticking.
    bus.write(TAC_ADDR, 0x05);
    assert_eq!(bus.read(TIMA_ADDR), 63);
}

#[test]
fn tac_unused_bits_read_set() {
    let mut bus = Bus::new();
    bus.write(TAC_ADDR, 0x05);
    assert_eq!(bus.read(TAC_ADDR), 0xFD);
}
