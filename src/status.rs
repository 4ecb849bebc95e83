//! FTP reply codes consumed by the session engine (RFC 959 / 2389 / 2428 / 3659).

/// 125 — data connection already open, transfer starting.
pub const ALREADY_OPEN: u16 = 125;
/// 150 — file status okay, about to open data connection.
pub const ABOUT_TO_SEND: u16 = 150;
/// 200 — command okay (TYPE, NOOP, PBSZ, PROT, OPTS success).
pub const COMMAND_OK: u16 = 200;
/// 202 — command superfluous; treated as success for OPTS UTF8.
pub const COMMAND_SUPERFLUOUS: u16 = 202;
/// 211 — system status (FEAT reply marker).
pub const SYSTEM_STATUS: u16 = 211;
/// 213 — file status (SIZE reply).
pub const FILE_STATUS: u16 = 213;
/// 220 — service ready (greeting, REIN).
pub const READY: u16 = 220;
/// 226 — closing data connection; acknowledgment after every transfer.
pub const CLOSING_DATA_CONNECTION: u16 = 226;
/// 227 — entering passive mode.
pub const PASSIVE_MODE: u16 = 227;
/// 229 — entering extended passive mode.
pub const EXTENDED_PASSIVE_MODE: u16 = 229;
/// 230 — user logged in.
pub const LOGGED_IN: u16 = 230;
/// 234 — AUTH security data exchange complete.
pub const AUTH_OK: u16 = 234;
/// 250 — requested file action okay (CWD, CDUP, DELE, RMD, RNTO).
pub const FILE_ACTION_OK: u16 = 250;
/// 257 — pathname created (PWD, MKD).
pub const PATH_CREATED: u16 = 257;
/// 331 — user name okay, need password.
pub const USER_OK: u16 = 331;
/// 350 — requested file action pending further information (REST, RNFR).
pub const FILE_PENDING: u16 = 350;
/// 501 — syntax error in parameters; tolerated for OPTS UTF8.
pub const BAD_ARGUMENTS: u16 = 501;
/// 504 — command not implemented for that parameter; tolerated for OPTS UTF8.
pub const BAD_PARAMETER: u16 = 504;
