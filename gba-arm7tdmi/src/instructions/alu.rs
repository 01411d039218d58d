// Implementazione istruzioni ALU (Arithmetic Logic Unit)
//
// Queste sono le istruzioni di base per operazioni matematiche e logiche:
// - ADD, SUB: Addizione e sottrazione
// - AND, OR, EOR: Operazioni logiche
// - MOV, MVN: Spostamento dati
// - CMP, TST: Confronti e test (solo flag, no write)
//
// Il barrel shifter vive qui perché quasi tutte le istruzioni data
// processing passano il secondo operando attraverso di esso.

use crate::arm::data_processing;
use crate::registers::Registers;

/// Tipi di shift del barrel shifter (bit 5-6 di operand2)
pub const SHIFT_LSL: u32 = 0;
pub const SHIFT_LSR: u32 = 1;
pub const SHIFT_ASR: u32 = 2;
pub const SHIFT_ROR: u32 = 3;

/// Barrel shifter (shift/rotate con carry out)
///
/// `from_register` distingue l'ammontare specificato da registro da quello
/// immediato: le codifiche "shift #0" hanno significati speciali solo nella
/// forma immediata.
///
/// Casi limite (forma immediata):
/// - LSL #0: valore inalterato, carry = carry corrente
/// - LSR #0: codifica LSR #32 (risultato 0, carry = bit 31)
/// - ASR #0: codifica ASR #32 (riempimento col segno, carry = bit 31)
/// - ROR #0: codifica RRX (rotazione a 33 bit attraverso il carry)
///
/// Forma da registro: ammontare 0 lascia tutto inalterato; ammontare >= 32
/// definito per tipo (LSL/LSR -> 0, ASR -> segno, ROR -> modulo 32).
pub fn barrel_shift(
    value: u32,
    shift_type: u32,
    amount: u32,
    carry_in: bool,
    from_register: bool,
) -> (u32, bool) {
    if from_register && amount == 0 {
        return (value, carry_in);
    }

    match shift_type {
        SHIFT_LSL => match amount {
            0 => (value, carry_in),
            1..=31 => (value << amount, (value >> (32 - amount)) & 1 != 0),
            32 => (0, value & 1 != 0),
            _ => (0, false),
        },
        SHIFT_LSR => {
            // LSR #0 immediato codifica LSR #32
            let amount = if amount == 0 { 32 } else { amount };
            match amount {
                1..=31 => (value >> amount, (value >> (amount - 1)) & 1 != 0),
                32 => (0, value >> 31 != 0),
                _ => (0, false),
            }
        }
        SHIFT_ASR => {
            // ASR #0 immediato codifica ASR #32
            let amount = if amount == 0 { 32 } else { amount };
            if amount < 32 {
                (
                    ((value as i32) >> amount) as u32,
                    (value >> (amount - 1)) & 1 != 0,
                )
            } else {
                let fill = ((value as i32) >> 31) as u32;
                (fill, value >> 31 != 0)
            }
        }
        SHIFT_ROR => {
            if amount == 0 {
                // ROR #0 immediato codifica RRX: rotazione a 33 bit col carry
                let result = (value >> 1) | ((carry_in as u32) << 31);
                (result, value & 1 != 0)
            } else {
                let effective = amount & 31;
                if effective == 0 {
                    // Multiplo di 32: valore inalterato, carry = bit 31
                    (value, value >> 31 != 0)
                } else {
                    let result = value.rotate_right(effective);
                    (result, (value >> (effective - 1)) & 1 != 0)
                }
            }
        }
        _ => unreachable!(),
    }
}

/// Decodifica e calcola Operand2 con barrel shifter
///
/// Operand2 può essere:
/// - Immediate: valore a 8 bit ruotato di 2*rotate
/// - Register: registro con shift (ammontare immediato o da registro)
///
/// # Returns
/// (valore, carry_out)
pub fn decode_operand2(regs: &Registers, operand2: u32, immediate: bool) -> (u32, bool) {
    if immediate {
        // Immediate: [11:8]=rotate, [7:0]=imm
        let imm = operand2 & 0xFF;
        let rotate = ((operand2 >> 8) & 0xF) * 2;
        let value = imm.rotate_right(rotate);
        let carry = if rotate == 0 {
            regs.flag_c()
        } else {
            (value >> 31) != 0
        };
        (value, carry)
    } else {
        // Register: [11:4]=shift, [3:0]=Rm
        let rm = (operand2 & 0xF) as usize;
        let shift_type = (operand2 >> 5) & 0x3;
        let by_register = (operand2 & (1 << 4)) != 0;

        let amount = if by_register {
            let rs = ((operand2 >> 8) & 0xF) as usize;
            regs.r[rs] & 0xFF
        } else {
            (operand2 >> 7) & 0x1F
        };

        // Con shift da registro il PC si legge 4 byte più avanti
        let rm_value = if rm == 15 && by_register {
            regs.r[15].wrapping_add(4)
        } else {
            regs.r[rm]
        };

        barrel_shift(rm_value, shift_type, amount, regs.flag_c(), by_register)
    }
}

/// Vero se operand2 usa uno shift con ammontare da registro
#[inline]
pub fn operand2_shifts_by_register(operand2: u32, immediate: bool) -> bool {
    !immediate && (operand2 & (1 << 4)) != 0
}

/// Addizione a 32 bit con carry in ingresso e flag C/V in uscita
#[inline]
fn add_with_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let wide = (a as u64) + (b as u64) + (carry_in as u64);
    let result = wide as u32;
    let carry = wide > 0xFFFF_FFFF;
    let overflow = ((a ^ result) & (b ^ result) & 0x8000_0000) != 0;
    (result, carry, overflow)
}

/// Esegue un'istruzione Data Processing (ALU)
///
/// # Arguments
/// * `regs` - Registri CPU
/// * `opcode` - Tipo operazione (AND, EOR, SUB, etc.)
/// * `rd` - Registro destinazione
/// * `rn_value` - Primo operando già letto (il chiamante applica i quirk
///   del PC)
/// * `operand2` - Secondo operando già passato dal barrel shifter
/// * `set_flags` - Se true, aggiorna i flag NZCV
/// * `shifter_carry` - Carry prodotto dal barrel shifter (per le logiche)
///
/// # Returns
/// Numero di cicli usati
pub fn execute_data_processing(
    regs: &mut Registers,
    opcode: u8,
    rd: u8,
    rn_value: u32,
    operand2: u32,
    set_flags: bool,
    shifter_carry: bool,
) -> u32 {
    let carry_in = regs.flag_c();

    // (risultato, scrive rd, carry, overflow, flag aritmetici)
    let (result, writes, carry, overflow, arithmetic) = match opcode {
        data_processing::AND => (rn_value & operand2, true, shifter_carry, false, false),
        data_processing::EOR => (rn_value ^ operand2, true, shifter_carry, false, false),
        data_processing::SUB => {
            let (res, c, v) = add_with_carry(rn_value, !operand2, true);
            (res, true, c, v, true)
        }
        data_processing::RSB => {
            let (res, c, v) = add_with_carry(operand2, !rn_value, true);
            (res, true, c, v, true)
        }
        data_processing::ADD => {
            let (res, c, v) = add_with_carry(rn_value, operand2, false);
            (res, true, c, v, true)
        }
        data_processing::ADC => {
            let (res, c, v) = add_with_carry(rn_value, operand2, carry_in);
            (res, true, c, v, true)
        }
        data_processing::SBC => {
            let (res, c, v) = add_with_carry(rn_value, !operand2, carry_in);
            (res, true, c, v, true)
        }
        data_processing::RSC => {
            let (res, c, v) = add_with_carry(operand2, !rn_value, carry_in);
            (res, true, c, v, true)
        }
        data_processing::TST => (rn_value & operand2, false, shifter_carry, false, false),
        data_processing::TEQ => (rn_value ^ operand2, false, shifter_carry, false, false),
        data_processing::CMP => {
            let (res, c, v) = add_with_carry(rn_value, !operand2, true);
            (res, false, c, v, true)
        }
        data_processing::CMN => {
            let (res, c, v) = add_with_carry(rn_value, operand2, false);
            (res, false, c, v, true)
        }
        data_processing::ORR => (rn_value | operand2, true, shifter_carry, false, false),
        data_processing::MOV => (operand2, true, shifter_carry, false, false),
        data_processing::BIC => (rn_value & !operand2, true, shifter_carry, false, false),
        data_processing::MVN => (!operand2, true, shifter_carry, false, false),
        _ => unreachable!(),
    };

    if writes && rd == 15 {
        // Scrittura in PC: con bit S è un ritorno da eccezione e il CPSR
        // viene ripreso dall'SPSR prima di allineare il nuovo PC
        if set_flags {
            regs.restore_cpsr();
        }
        let mask = if regs.is_thumb() { !1u32 } else { !3u32 };
        regs.set_pc(result & mask);
        return 3;
    }

    if writes {
        regs.r[rd as usize] = result;
    }

    if set_flags {
        if arithmetic {
            regs.set_flags(result >> 31 != 0, result == 0, carry, overflow);
        } else {
            // Le logiche prendono C dallo shifter e non toccano V
            regs.set_flag_n(result >> 31 != 0);
            regs.set_flag_z(result == 0);
            regs.set_flag_c(carry);
        }
    }

    1
}
