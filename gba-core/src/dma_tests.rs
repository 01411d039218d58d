use crate::dma::*;

/// Scrive un indirizzo a 32 bit nei due registri halfword
fn write_address(dma: &mut Dma, reg: u32, value: u32) {
    dma.write16(reg, value as u16);
    dma.write16(reg + 2, (value >> 16) as u16);
}

#[test]
fn test_dma_creation() {
    let dma = Dma::new();
    assert!(!dma.is_active());
    assert_eq!(dma.active_channel(), None);
}

#[test]
fn test_dma_control_register() {
    let mut control = DmaControl::default();
    assert!(!control.enabled);
    assert!(!control.irq_enable);
    assert_eq!(control.timing, 0);

    control = DmaControl::from_u16(0xD400); // Enable + IRQ + VBlank + 32bit
    assert!(control.enabled);
    assert!(control.irq_enable);
    assert_eq!(control.timing, 1); // VBlank
    assert!(control.transfer_32bit);
    assert_eq!(control.to_u16(), 0xD400);
}

#[test]
fn test_dma_timing_enum() {
    assert_eq!(DmaTiming::from_u8(0), DmaTiming::Immediate);
    assert_eq!(DmaTiming::from_u8(1), DmaTiming::VBlank);
    assert_eq!(DmaTiming::from_u8(2), DmaTiming::HBlank);
    assert_eq!(DmaTiming::from_u8(3), DmaTiming::Special);
}

#[test]
fn test_dma_registers_are_write_only() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA0SAD, 0x0200_0000);
    write_address(&mut dma, DMA0DAD, 0x0600_0000);
    dma.write16(DMA0CNT_L, 0x0100);

    // Il valore è arrivato ai registri interni...
    let (source, dest, count) = dma.channel_registers(0);
    assert_eq!(source, 0x0200_0000);
    assert_eq!(dest, 0x0600_0000);
    assert_eq!(count, 0x0100);

    // ...ma SAD/DAD/CNT_L non si rileggono dal bus
    assert_eq!(dma.read16(DMA0SAD), 0);
    assert_eq!(dma.read16(DMA0DAD), 0);
    assert_eq!(dma.read16(DMA0CNT_L), 0);
}

#[test]
fn test_dma_source_mask() {
    let mut dma = Dma::new();

    // DMA0: può leggere solo memoria interna (27 bit)
    write_address(&mut dma, DMA0SAD, 0x0800_1234);
    let (source, _, _) = dma.channel_registers(0);
    assert_eq!(source & 0x0800_0000, 0);

    // DMA3: qualsiasi memoria
    write_address(&mut dma, DMA3SAD, 0x0800_1234);
    let (source, _, _) = dma.channel_registers(3);
    assert_eq!(source, 0x0800_1234);
}

#[test]
fn test_dma_dest_mask() {
    let mut dma = Dma::new();

    // DMA0-2: destinazione solo in memoria interna
    write_address(&mut dma, DMA0DAD, 0x0800_1234);
    let (_, dest, _) = dma.channel_registers(0);
    assert_eq!(dest & 0x0800_0000, 0);

    // DMA3: può scrivere ovunque
    write_address(&mut dma, DMA3DAD, 0x0800_1234);
    let (_, dest, _) = dma.channel_registers(3);
    assert_eq!(dest, 0x0800_1234);
}

#[test]
fn test_dma_immediate_arms_on_enable() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA0SAD, 0x0200_0000);
    write_address(&mut dma, DMA0DAD, 0x0300_0000);
    dma.write16(DMA0CNT_L, 10);
    dma.write16(DMA0CNT_H, 0x8000); // enable, immediato, 16 bit

    assert!(dma.is_active());
    assert_eq!(dma.active_channel(), Some(0));

    let burst = dma.next_burst().expect("canale armato");
    assert_eq!(burst.channel_id, 0);
    assert_eq!(burst.source, 0x0200_0000);
    assert_eq!(burst.dest, 0x0300_0000);
    assert_eq!(burst.count, 10);
    assert_eq!(burst.unit, 2);
    assert_eq!(burst.source_delta, 2);
    assert_eq!(burst.dest_delta, 2);

    // Fine burst senza repeat: enable azzerato
    dma.finish_burst(0, burst.source + 20, burst.dest + 20);
    assert_eq!(dma.read16(DMA0CNT_H) & 0x8000, 0);
    assert!(!dma.is_active());
}

#[test]
fn test_dma_zero_count_means_max() {
    let mut dma = Dma::new();

    dma.write16(DMA0CNT_L, 0);
    dma.write16(DMA0CNT_H, 0x8000);
    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.count, 0x4000); // canali 0-2: max 16384

    let mut dma = Dma::new();
    dma.write16(DMA3CNT_L, 0);
    dma.write16(DMA3CNT_H, 0x8000);
    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.count, 0x1_0000); // canale 3: max 65536
}

#[test]
fn test_dma_latches_on_enable_transition() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA0SAD, 0x0200_0000);
    dma.write16(DMA0CNT_L, 4);
    dma.write16(DMA0CNT_H, 0x8000);

    // Riscrivere SAD a canale già abilitato non tocca il latch
    write_address(&mut dma, DMA0SAD, 0x0300_0000);

    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.source, 0x0200_0000);
}

#[test]
fn test_dma_vblank_waits_for_trigger() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA1SAD, 0x0200_0000);
    write_address(&mut dma, DMA1DAD, 0x0300_0000);
    dma.write16(DMA1CNT_L, 5);
    dma.write16(DMA1CNT_H, 0x9000); // enable, VBlank

    assert!(!dma.is_active());
    assert!(dma.next_burst().is_none());

    dma.trigger(DmaTiming::VBlank);
    assert!(dma.is_active());
    assert_eq!(dma.active_channel(), Some(1));
}

#[test]
fn test_dma_hblank_never_triggers_channel_0() {
    let mut dma = Dma::new();

    dma.write16(DMA0CNT_L, 1);
    dma.write16(DMA0CNT_H, 0xA000); // enable, HBlank
    dma.write16(DMA2CNT_L, 1);
    dma.write16(DMA2CNT_H, 0xA000);

    dma.trigger(DmaTiming::HBlank);

    // Solo il canale 2 si arma
    assert_eq!(dma.active_channel(), Some(2));
}

#[test]
fn test_dma_priority_lowest_channel_wins() {
    let mut dma = Dma::new();

    dma.write16(DMA3CNT_L, 1);
    dma.write16(DMA3CNT_H, 0x8000);
    dma.write16(DMA1CNT_L, 1);
    dma.write16(DMA1CNT_H, 0x8000);

    // Entrambi armati: esce prima il canale 1
    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.channel_id, 1);
    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.channel_id, 3);
}

#[test]
fn test_dma_repeat_rearms_on_next_trigger() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA1SAD, 0x0200_0000);
    write_address(&mut dma, DMA1DAD, 0x0300_0000);
    dma.write16(DMA1CNT_L, 2);
    dma.write16(DMA1CNT_H, 0x9200); // enable, VBlank, repeat

    dma.trigger(DmaTiming::VBlank);
    let burst = dma.next_burst().unwrap();
    dma.finish_burst(1, burst.source + 4, burst.dest + 4);

    // Con repeat l'enable resta alto e il trigger successivo riarma
    assert_eq!(dma.read16(DMA1CNT_H) & 0x8000, 0x8000);
    dma.trigger(DmaTiming::VBlank);
    assert!(dma.is_active());

    // Il conteggio è stato ricaricato e la sorgente prosegue
    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.count, 2);
    assert_eq!(burst.source, 0x0200_0004);
}

#[test]
fn test_dma_dest_reload_restores_latched_dest() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA1SAD, 0x0200_0000);
    write_address(&mut dma, DMA1DAD, 0x0300_0000);
    dma.write16(DMA1CNT_L, 4);
    // enable, VBlank, repeat, dest-control = 3 (increment+reload)
    dma.write16(DMA1CNT_H, 0x9200 | (3 << 5));

    dma.trigger(DmaTiming::VBlank);
    let burst = dma.next_burst().unwrap();
    // Durante il burst si comporta da incremento
    assert_eq!(burst.dest_delta, 2);

    dma.finish_burst(1, burst.source + 8, burst.dest + 8);
    // Al termine la destinazione torna al valore latchato
    let (_, dest) = dma.channel_latches(1);
    assert_eq!(dest, 0x0300_0000);
}

#[test]
fn test_dma_fifo_mode_forces_shape() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA1SAD, 0x0200_0000);
    write_address(&mut dma, DMA1DAD, 0x0400_00A0);
    dma.write16(DMA1CNT_L, 100); // il conteggio programmato viene ignorato
    dma.write16(DMA1CNT_H, 0xB200); // enable, Special, repeat

    dma.trigger_special(1);
    let burst = dma.next_burst().unwrap();

    // FIFO: 4 parole da 32 bit a destinazione fissa
    assert_eq!(burst.unit, 4);
    assert_eq!(burst.count, 4);
    assert_eq!(burst.dest_delta, 0);
    assert_eq!(burst.source_delta, 4);
}

#[test]
fn test_dma_decrement_and_fixed_deltas() {
    let mut dma = Dma::new();

    dma.write16(DMA0CNT_L, 3);
    // src decrement (01 << 7), dest fixed (10 << 5), enable
    dma.write16(DMA0CNT_H, 0x8000 | (1 << 7) | (2 << 5));

    let burst = dma.next_burst().unwrap();
    assert_eq!(burst.source_delta, -2);
    assert_eq!(burst.dest_delta, 0);
}

#[test]
fn test_dma_irq_flag_from_finish() {
    let mut dma = Dma::new();

    dma.write16(DMA0CNT_L, 2);
    dma.write16(DMA0CNT_H, 0xC000); // enable + IRQ
    let burst = dma.next_burst().unwrap();
    assert!(dma.finish_burst(0, burst.source + 4, burst.dest + 4));

    let mut dma = Dma::new();
    dma.write16(DMA0CNT_L, 2);
    dma.write16(DMA0CNT_H, 0x8000); // senza IRQ
    let burst = dma.next_burst().unwrap();
    assert!(!dma.finish_burst(0, burst.source + 4, burst.dest + 4));
}

#[test]
fn test_dma_disable_disarms() {
    let mut dma = Dma::new();

    dma.write16(DMA0CNT_L, 100);
    dma.write16(DMA0CNT_H, 0x8000);
    assert!(dma.is_active());

    dma.write16(DMA0CNT_H, 0x0000);
    assert!(!dma.is_active());
    assert!(dma.next_burst().is_none());
}

#[test]
fn test_dma_reset() {
    let mut dma = Dma::new();

    write_address(&mut dma, DMA0SAD, 0x0200_0000);
    dma.write16(DMA0CNT_L, 100);
    dma.write16(DMA0CNT_H, 0x8000);
    assert!(dma.is_active());

    dma.reset();
    assert!(!dma.is_active());
    assert_eq!(dma.channel_registers(0), (0, 0, 0));
    assert_eq!(dma.read16(DMA0CNT_H) & 0x8000, 0);
}
