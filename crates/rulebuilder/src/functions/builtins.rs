// Built-in message processing functions
//
// Each entry is (name, return type, rule builder enabled, parameters). The
// parameter list is written as "name:type" pairs separated by commas, with a
// trailing '?' marking optional parameters.

use super::catalog::CatalogBuilder;
use super::types::{FunctionDescriptor, ParameterDescriptor, ReturnType};
use crate::registry::RegistryError;

type Builtin = (&'static str, ReturnType, bool, &'static str);

const BUILTINS: &[Builtin] = &[
	// conversions
	("to_bool", ReturnType::Boolean, true, "value:object"),
	("to_double", ReturnType::Double, true, "value:object, default:double?"),
	("to_long", ReturnType::Long, true, "value:object, default:long?"),
	("to_string", ReturnType::String, true, "value:object, default:string?"),
	("to_map", ReturnType::Map, true, "value:object"),
	("csv_to_map", ReturnType::Map, true, "value:string, fieldNames:string, separator:string?, quoteChar:string?"),
	("hex_to_decimal", ReturnType::Long, true, "value:string"),
	// type checks
	("is_bool", ReturnType::Boolean, true, "value:object"),
	("is_number", ReturnType::Boolean, true, "value:object"),
	("is_double", ReturnType::Boolean, true, "value:object"),
	("is_long", ReturnType::Boolean, true, "value:object"),
	("is_string", ReturnType::Boolean, true, "value:object"),
	("is_collection", ReturnType::Boolean, true, "value:object"),
	("is_list", ReturnType::Boolean, true, "value:object"),
	("is_map", ReturnType::Boolean, true, "value:object"),
	("is_date", ReturnType::Boolean, true, "value:object"),
	("is_period", ReturnType::Boolean, true, "value:object"),
	("is_ip", ReturnType::Boolean, true, "value:object"),
	("is_json", ReturnType::Boolean, true, "value:object"),
	("is_url", ReturnType::Boolean, true, "value:object"),
	// message fields
	("has_field", ReturnType::Boolean, true, "field:string, message:message?"),
	("get_field", ReturnType::Object, true, "field:string, message:message?"),
	("set_field", ReturnType::Void, true, "field:string, value:object, prefix:string?, suffix:string?, message:message?, default:object?"),
	("set_fields", ReturnType::Void, true, "fields:map, prefix:string?, suffix:string?, message:message?"),
	("rename_field", ReturnType::Void, true, "old_field:string, new_field:string, message:message?"),
	("remove_field", ReturnType::Void, true, "field:string, message:message?, invert:boolean?"),
	("remove_single_field", ReturnType::Void, true, "field:string, message:message?"),
	("remove_multiple_fields", ReturnType::Void, true, "pattern:string?, names:list?, message:message?"),
	("remove_string_fields_by_value", ReturnType::Void, true, "value:string, message:message?"),
	("normalize_fields", ReturnType::Void, true, "message:message?"),
	// message handling
	("drop_message", ReturnType::Void, true, "message:message?"),
	("create_message", ReturnType::Message, false, "message:string?, source:string?, timestamp:date_time?"),
	("clone_message", ReturnType::Message, false, "message:message?, preserve_streams:boolean?"),
	("remove_from_stream", ReturnType::Void, true, "id:string?, name:string?, message:message?"),
	("route_to_stream", ReturnType::Void, true, "id:string?, name:string?, message:message?, remove_from_default:boolean?"),
	("traffic_accounting_size", ReturnType::Long, false, "message:message?"),
	("from_input", ReturnType::Boolean, true, "id:string?, name:string?"),
	// pattern matching
	("regex", ReturnType::Map, true, "pattern:string, value:string, group_names:list?"),
	("regex_replace", ReturnType::String, true, "pattern:string, value:string, replacement:string, replace_all:boolean?"),
	("grok", ReturnType::Map, true, "pattern:string, value:string, only_named_captures:boolean?"),
	("multi_grok", ReturnType::Map, true, "patterns:list, value:string, only_named_captures:boolean?"),
	("grok_exists", ReturnType::Boolean, true, "pattern:string, log_missing:boolean?"),
	// strings
	("abbreviate", ReturnType::String, true, "value:string, width:long"),
	("capitalize", ReturnType::String, true, "value:string"),
	("contains", ReturnType::Boolean, true, "value:string, search:string, ignore_case:boolean?"),
	("ends_with", ReturnType::Boolean, true, "value:string, suffix:string, ignore_case:boolean?"),
	("lowercase", ReturnType::String, true, "value:string, locale:string?"),
	("substring", ReturnType::String, true, "value:string, start:long, end:long?"),
	("swapcase", ReturnType::String, true, "value:string"),
	("uncapitalize", ReturnType::String, true, "value:string"),
	("uppercase", ReturnType::String, true, "value:string, locale:string?"),
	("concat", ReturnType::String, true, "first:string, second:string"),
	("key_value", ReturnType::Map, true, "value:string, delimiters:string?, kv_delimiters:string?, ignore_empty_values:boolean?, allow_dup_keys:boolean?, handle_dup_keys:string?, trim_key_chars:string?, trim_value_chars:string?"),
	("join", ReturnType::String, true, "elements:list, delimiter:string?, start:long?, end:long?"),
	("split", ReturnType::List, true, "pattern:string, value:string, limit:long?"),
	("starts_with", ReturnType::Boolean, true, "value:string, prefix:string, ignore_case:boolean?"),
	("replace", ReturnType::String, true, "value:string, search:string, replacement:string?, max:long?"),
	("length", ReturnType::Long, true, "value:string, bytes:boolean?"),
	("first_non_null", ReturnType::Object, true, "value:list"),
	("string_entropy", ReturnType::Double, true, "value:string, default:double?"),
	// json
	("parse_json", ReturnType::Object, true, "value:string, depth:long?"),
	("flatten_json", ReturnType::Object, true, "value:string, array_flatten:string, stringify:boolean?"),
	("select_jsonpath", ReturnType::Map, true, "json:object, paths:map"),
	// dates
	("to_date", ReturnType::DateTime, true, "value:object, timezone:string?"),
	("now", ReturnType::DateTime, false, "timezone:string?"),
	("parse_date", ReturnType::DateTime, true, "value:string, pattern:string, locale:string?, timezone:string?"),
	("parse_unix_milliseconds", ReturnType::DateTime, true, "value:long, timezone:string?"),
	("flex_parse_date", ReturnType::DateTime, true, "value:string, default:date_time?, timezone:string?"),
	("format_date", ReturnType::String, true, "value:date_time, format:string, timezone:string?"),
	("years", ReturnType::Duration, false, "value:long"),
	("months", ReturnType::Duration, false, "value:long"),
	("weeks", ReturnType::Duration, false, "value:long"),
	("days", ReturnType::Duration, false, "value:long"),
	("hours", ReturnType::Duration, false, "value:long"),
	("minutes", ReturnType::Duration, false, "value:long"),
	("seconds", ReturnType::Duration, false, "value:long"),
	("millis", ReturnType::Duration, false, "value:long"),
	("period", ReturnType::Duration, false, "value:string"),
	// hashing
	("crc32", ReturnType::String, true, "value:string"),
	("crc32c", ReturnType::String, true, "value:string"),
	("md5", ReturnType::String, true, "value:string"),
	("murmur3_32", ReturnType::String, true, "value:string"),
	("murmur3_128", ReturnType::String, true, "value:string"),
	("sha1", ReturnType::String, true, "value:string"),
	("sha256", ReturnType::String, true, "value:string"),
	("sha512", ReturnType::String, true, "value:string"),
	// encoding
	("base16_encode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base16_decode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base32_encode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base32_decode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base32human_encode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base32human_decode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base64_encode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base64_decode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base64url_encode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	("base64url_decode", ReturnType::String, true, "value:string, omit_padding:boolean?"),
	// ip handling
	("cidr_match", ReturnType::Boolean, true, "cidr:string, ip:ip_address"),
	("to_ip", ReturnType::IpAddress, true, "ip:object, default:string?"),
	("anonymize_ip", ReturnType::IpAddress, true, "ip:ip_address"),
	// null support
	("is_null", ReturnType::Boolean, true, "value:object"),
	("is_not_null", ReturnType::Boolean, true, "value:object"),
	// urls
	("to_url", ReturnType::Url, true, "url:object, default:string?"),
	("urldecode", ReturnType::String, true, "value:string, charset:string?"),
	("urlencode", ReturnType::String, true, "value:string, charset:string?"),
	// syslog
	("syslog_facility", ReturnType::String, true, "value:long"),
	("syslog_level", ReturnType::String, true, "value:long"),
	("expand_syslog_priority", ReturnType::Object, true, "value:long"),
	("expand_syslog_priority_as_string", ReturnType::Object, true, "value:long"),
	// lookup tables
	("lookup", ReturnType::Map, true, "lookup_table:string, key:object, default:object?"),
	("lookup_value", ReturnType::Object, true, "lookup_table:string, key:object, default:object?"),
	("lookup_has_value", ReturnType::Boolean, true, "lookup_table:string, key:object"),
	("lookup_string_list", ReturnType::List, true, "lookup_table:string, key:object, default:list?"),
	("lookup_set_value", ReturnType::Object, true, "lookup_table:string, key:string, value:object, ttl:long?"),
	("lookup_clear_key", ReturnType::Void, true, "lookup_table:string, key:string"),
	("lookup_set_string_list", ReturnType::List, true, "lookup_table:string, key:string, value:list"),
	("lookup_add_string_list", ReturnType::List, true, "lookup_table:string, key:string, value:list, keep_duplicates:boolean?"),
	("lookup_remove_string_list", ReturnType::List, true, "lookup_table:string, key:string, value:list"),
	("lookup_string_list_contains", ReturnType::Boolean, true, "lookup_table:string, key:object, value:string"),
	("lookup_assign_ttl", ReturnType::Object, true, "lookup_table:string, key:string, ttl:long"),
	("list_get", ReturnType::Object, true, "value:list, index:long"),
	("list_count", ReturnType::Long, true, "value:list"),
	("lookup_all", ReturnType::List, true, "lookup_table:string, keys:list"),
	// maps
	("map_remove", ReturnType::Map, true, "map:map, key:string"),
	("map_set", ReturnType::Map, true, "map:map, key:string, value:object"),
	("map_get", ReturnType::Object, true, "map:map, key:string"),
	("map_copy", ReturnType::Map, true, "map:map"),
	// debugging
	("debug", ReturnType::Void, false, "value:object"),
	("metric_counter_increment", ReturnType::Void, true, "name:string, value:long?"),
	// arrays
	("array_contains", ReturnType::Boolean, true, "elements:list, value:object, case_sensitive:boolean?"),
	("array_remove", ReturnType::List, true, "elements:list, value:object, remove_all:boolean?"),
	("string_array_add", ReturnType::List, true, "elements:list, value:object, only_unique:boolean?"),
];

/// Register every built-in function as public
pub fn register_builtins(builder: &mut CatalogBuilder) -> Result<(), RegistryError> {
	for &(name, return_type, rule_builder, params) in BUILTINS {
		let mut descriptor = FunctionDescriptor::new(name, return_type);
		descriptor.rule_builder_enabled = rule_builder;
		descriptor.params = parse_params(name, params)?;
		builder.register(descriptor);
	}
	Ok(())
}

pub(crate) fn parse_params(
	function: &str,
	signature: &str,
) -> Result<Vec<ParameterDescriptor>, RegistryError> {
	let mut params = Vec::new();
	for part in signature.split(',').map(str::trim).filter(|p| !p.is_empty()) {
		let (name, ty) = part.split_once(':').ok_or_else(|| {
			RegistryError::invalid_descriptor(function, format!("malformed parameter '{part}'"))
		})?;
		let (ty, optional) = match ty.trim().strip_suffix('?') {
			Some(ty) => (ty, true),
			None => (ty.trim(), false),
		};
		let ty: ReturnType = ty.parse()?;
		params.push(if optional {
			ParameterDescriptor::optional(name.trim(), ty)
		} else {
			ParameterDescriptor::required(name.trim(), ty)
		});
	}
	Ok(params)
}
